//! Gemini (generativelanguage.googleapis.com) transparent proxy (spec §6):
//! same-shape pass-through with the server's Gemini API key injected as a
//! `?key=` query parameter, the way the public API expects it.

use std::time::Duration;

use crate::error::AppError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub fn api_key() -> Option<String> {
    std::env::var("NEXUS_GEMINI_API_KEY")
        .or_else(|_| std::env::var("GEMINI_API_KEY"))
        .ok()
        .filter(|s| !s.is_empty())
}

pub fn base_url() -> String {
    std::env::var("NEXUS_GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

pub fn timeout() -> Duration {
    let secs = std::env::var("NEXUS_GEMINI_PROXY_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);
    Duration::from_secs(secs)
}

const ALLOWED_ACTIONS: &[&str] = &[
    "generateContent",
    "streamGenerateContent",
    "countTokens",
    "embedContent",
    "batchEmbedContents",
];

pub fn validate_action(action: &str) -> Result<(), AppError> {
    if ALLOWED_ACTIONS.contains(&action) {
        Ok(())
    } else {
        Err(AppError::RouteRejected(format!("action '{action}' not supported by the Gemini proxy")))
    }
}

/// `GET /v1beta/models` and `GET /v1beta/models/{model}` pass straight
/// through; `/v1beta/openai/chat/completions` is the OpenAI-compatible
/// surface Gemini also exposes and is proxied unmodified aside from the key.
pub const MODELS_LIST_PATH: &str = "/v1beta/models";
pub const OPENAI_COMPAT_PATH: &str = "/v1beta/openai/chat/completions";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_actions_rejects_unknown() {
        assert!(validate_action("generateContent").is_ok());
        assert!(validate_action("embedContent").is_ok());
        assert!(validate_action("deleteEverything").is_err());
    }
}
