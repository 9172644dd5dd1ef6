//! Token manager (C2): an in-memory cache of OAuth access tokens keyed by
//! account, with periodic refresh, rotation, and deactivation on permanent
//! failure.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::store::{Account, Store};

const FRESHNESS_THRESHOLD_SECS: i64 = 60;
const REFRESH_AHEAD_SECS: i64 = 20 * 60;
const TICK_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Errors returned by the provider's refresh-token endpoint that mean the
/// refresh token itself is dead and re-login is required.
const PERMANENT_FAILURE_MARKERS: &[&str] = &[
    "invalid_grant",
    "invalid_client",
    "unauthorized_client",
    "token has been expired or revoked",
    "revoked",
];

pub fn is_permanent_failure(message: &str) -> bool {
    PERMANENT_FAILURE_MARKERS.iter().any(|m| message.contains(m))
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    pub account_id: String,
    pub access_token: String,
    pub expires_at: i64,
    pub project_id: Option<String>,
    pub email: String,
}

/// Exchanges a refresh token for a new access token. Implemented by each
/// upstream's OAuth provider (only Google is wired for the core's own
/// accounts; Codex manages its own JWT-based refresh independently, see
/// `upstream::codex`).
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, String>;
}

pub struct RefreshedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

pub struct TokenManager {
    store: Arc<Store>,
    refresher: Arc<dyn TokenRefresher>,
    cache: DashMap<String, CachedToken>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub async fn new(store: Arc<Store>, refresher: Arc<dyn TokenRefresher>) -> Result<Self, AppError> {
        let manager = Self {
            store,
            refresher,
            cache: DashMap::new(),
            refresh_lock: Mutex::new(()),
        };
        manager.rebuild_cache().await?;
        Ok(manager)
    }

    /// Rebuilds the cache from the store — used at startup and after bulk
    /// operations (e.g. operator account mutations).
    pub async fn rebuild_cache(&self) -> Result<(), AppError> {
        self.cache.clear();
        for account in self.store.active_accounts().await? {
            self.cache.insert(account.id.clone(), to_cached(&account));
        }
        Ok(())
    }

    /// Returns the primary-active account's token; if none, the most
    /// recently used active account; else `NoValidToken`.
    pub async fn get_primary_or_default(&self) -> Result<CachedToken, AppError> {
        let accounts = self.store.active_accounts().await?;
        let chosen = accounts
            .iter()
            .find(|a| a.is_primary)
            .or_else(|| accounts.iter().max_by_key(|a| a.last_used_at.unwrap_or(0)));

        match chosen {
            Some(account) => self.get_by_account_id(&account.id).await,
            None => Err(AppError::NoValidToken),
        }
    }

    /// Returns the cached token if expiry is more than 60s in the future;
    /// otherwise synchronously refreshes and re-reads.
    pub async fn get_by_account_id(&self, id: &str) -> Result<CachedToken, AppError> {
        let now = Utc::now().timestamp();
        if let Some(cached) = self.cache.get(id) {
            if cached.expires_at - now > FRESHNESS_THRESHOLD_SECS {
                let _ = self.store.touch_last_used(id).await;
                return Ok(cached.clone());
            }
        }

        self.refresh_account(id).await?;

        self.cache
            .get(id)
            .map(|c| c.clone())
            .ok_or(AppError::NoValidToken)
    }

    /// Forces an immediate refresh regardless of freshness, for the operator
    /// surface's `/api/accounts/{id}/refresh` — unlike [`Self::get_by_account_id`]
    /// this never serves a cached token without calling the refresher first.
    pub async fn force_refresh(&self, id: &str) -> Result<CachedToken, AppError> {
        self.refresh_account(id).await?;
        self.cache.get(id).map(|c| c.clone()).ok_or(AppError::NoValidToken)
    }

    /// Fires an async refresh per active account.
    pub async fn refresh_all(self: &Arc<Self>) {
        let accounts = match self.store.active_accounts().await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(error = %e, "refresh_all: failed to list active accounts");
                return;
            }
        };

        for account in accounts {
            let this = self.clone();
            let id = account.id.clone();
            tokio::spawn(async move {
                if let Err(e) = this.refresh_account(&id).await {
                    tracing::warn!(account_id = %id, error = %e, "account refresh failed");
                }
            });
        }
    }

    /// Wakes every 15 minutes and refreshes any account whose expiry is
    /// within 20 minutes.
    pub fn start_refresh_loop(self: Arc<Self>, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Utc::now().timestamp();
                        let due: Vec<String> = self
                            .cache
                            .iter()
                            .filter(|e| e.expires_at - now < REFRESH_AHEAD_SECS)
                            .map(|e| e.key().clone())
                            .collect();
                        for id in due {
                            if let Err(e) = self.refresh_account(&id).await {
                                tracing::warn!(account_id = %id, error = %e, "scheduled refresh failed");
                            }
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("token refresh loop shutting down");
                        break;
                    }
                }
            }
        });
    }

    /// Refresh takes the exclusive lock only across cache mutation, never
    /// across the refresh HTTP call itself.
    async fn refresh_account(&self, id: &str) -> Result<(), AppError> {
        let account = self
            .store
            .get_account(id)
            .await?
            .ok_or(AppError::NoValidToken)?;

        if account.refresh_token.is_empty() {
            return Err(AppError::NoValidToken);
        }

        match self.refresher.refresh(&account.refresh_token).await {
            Ok(refreshed) => {
                let expires_at = Utc::now().timestamp() + refreshed.expires_in;
                let new_refresh = refreshed.refresh_token.unwrap_or(account.refresh_token.clone());

                self.store
                    .update_token(id, &refreshed.access_token, &new_refresh, expires_at)
                    .await?;

                let _guard = self.refresh_lock.lock().await;
                self.cache.insert(
                    id.to_string(),
                    CachedToken {
                        account_id: id.to_string(),
                        access_token: refreshed.access_token,
                        expires_at,
                        project_id: account.project_id(),
                        email: account.email,
                    },
                );
                tracing::info!(account_id = %id, "token refreshed");
                Ok(())
            }
            Err(message) => {
                if is_permanent_failure(&message) {
                    self.store.deactivate_account(id).await?;
                    let _guard = self.refresh_lock.lock().await;
                    self.cache.remove(id);
                    tracing::warn!(account_id = %id, "refresh returned permanent failure; account deactivated, re-login required");
                    Err(AppError::PermanentAuthFailure {
                        account_id: id.to_string(),
                        message,
                    })
                } else {
                    tracing::warn!(account_id = %id, error = %message, "transient refresh failure, will retry");
                    Err(AppError::UpstreamTransport(message))
                }
            }
        }
    }
}

fn to_cached(account: &Account) -> CachedToken {
    CachedToken {
        account_id: account.id.clone(),
        access_token: account.access_token.clone(),
        expires_at: account.expires_at,
        project_id: account.project_id(),
        email: account.email.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRefresher {
        fail_with: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            Ok(RefreshedToken {
                access_token: "new-access-token".to_string(),
                refresh_token: Some("new-refresh-token".to_string()),
                expires_in: 3600,
            })
        }
    }

    #[test]
    fn permanent_failure_markers_match_spec_list() {
        assert!(is_permanent_failure("error: invalid_grant"));
        assert!(is_permanent_failure("token has been expired or revoked"));
        assert!(!is_permanent_failure("connection reset by peer"));
    }

    #[tokio::test]
    async fn refresh_permanent_failure_deactivates_and_evicts() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        store
            .upsert_account("acc-1", "a@example.com", "google", "at", "rt", 0, "{}")
            .await
            .unwrap();

        let refresher = Arc::new(FakeRefresher {
            fail_with: Some("invalid_grant".to_string()),
            calls: AtomicUsize::new(0),
        });
        let manager = TokenManager::new(store.clone(), refresher).await.unwrap();

        let result = manager.get_by_account_id("acc-1").await;
        assert!(result.is_err());

        let account = store.get_account("acc-1").await.unwrap().unwrap();
        assert!(!account.is_active);
        assert!(manager.cache.get("acc-1").is_none());
    }

    #[tokio::test]
    async fn fresh_token_is_served_without_refresh_call() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let future_expiry = Utc::now().timestamp() + 3600;
        store
            .upsert_account("acc-1", "a@example.com", "google", "at", "rt", future_expiry, "{}")
            .await
            .unwrap();

        let refresher = Arc::new(FakeRefresher {
            fail_with: None,
            calls: AtomicUsize::new(0),
        });
        let manager = TokenManager::new(store, refresher.clone()).await.unwrap();
        let token = manager.get_by_account_id("acc-1").await.unwrap();
        assert_eq!(token.access_token, "at");
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_valid_token_when_no_active_accounts() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let refresher = Arc::new(FakeRefresher {
            fail_with: None,
            calls: AtomicUsize::new(0),
        });
        let manager = TokenManager::new(store, refresher).await.unwrap();
        let result = manager.get_primary_or_default().await;
        assert!(matches!(result, Err(AppError::NoValidToken)));
    }
}
