//! Process-wide CSRF/PKCE state for in-flight Google logins (spec §9:
//! "the state-token-for-OAuth-CSRF are process-wide... model as an explicit
//! service"). Entries are one-shot and expire after 10 minutes so an
//! abandoned login can't be replayed.

use dashmap::DashMap;

use crate::store::now_secs;

const PENDING_TTL_SECS: i64 = 10 * 60;

#[derive(Debug, Clone)]
struct PendingAuth {
    code_verifier: String,
    created_at: i64,
}

#[derive(Default)]
pub struct OAuthStateStore {
    pending: DashMap<String, PendingAuth>,
}

impl OAuthStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, state: String, code_verifier: String) {
        self.pending.insert(state, PendingAuth { code_verifier, created_at: now_secs() });
    }

    /// Consumes the pending entry for `state`, returning its verifier. A
    /// second call with the same state (replay) returns `None`.
    pub fn take(&self, state: &str) -> Option<String> {
        let (_, entry) = self.pending.remove(state)?;
        if now_secs() - entry.created_at > PENDING_TTL_SECS {
            return None;
        }
        Some(entry.code_verifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_consumes_entry_exactly_once() {
        let store = OAuthStateStore::new();
        store.begin("state-1".to_string(), "verifier-1".to_string());
        assert_eq!(store.take("state-1").as_deref(), Some("verifier-1"));
        assert!(store.take("state-1").is_none());
    }

    #[test]
    fn unknown_state_returns_none() {
        let store = OAuthStateStore::new();
        assert!(store.take("never-issued").is_none());
    }
}
