//! Vertex AI transparent proxy (spec §4.6, §6): rewrites the client's
//! Gemini-shaped path onto Vertex's publisher-model path and injects the
//! server-held Vertex API key, leaving the request/response bodies
//! untouched.

use axum::http::Method;
use std::time::Duration;

use crate::error::AppError;

const ALLOWED_ACTIONS: &[&str] = &["generateContent", "streamGenerateContent", "countTokens"];
const DEFAULT_BASE_URL: &str = "https://aiplatform.googleapis.com";

pub fn api_key() -> Option<String> {
    std::env::var("NEXUS_VERTEX_API_KEY").ok().filter(|s| !s.is_empty())
}

pub fn base_url() -> String {
    std::env::var("NEXUS_VERTEX_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

pub fn timeout() -> Duration {
    let secs = std::env::var("NEXUS_VERTEX_PROXY_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);
    Duration::from_secs(secs)
}

/// Validates an action for the `/v1/publishers/google/models/{model}:{action}`
/// route, where the client already speaks Vertex's own path shape (no rewrite).
pub fn validate_action(action: &str) -> Result<(), AppError> {
    if ALLOWED_ACTIONS.contains(&action) {
        Ok(())
    } else {
        Err(AppError::RouteRejected(format!("action '{action}' not supported by the Vertex proxy")))
    }
}

/// `/v1beta/models/{model}:{action}` -> `/v1/publishers/google/models/{model}:{action}`,
/// stripping a leading `google/` from the model id if the client sent one.
pub fn rewrite_path(model: &str, action: &str) -> Result<String, AppError> {
    if !ALLOWED_ACTIONS.contains(&action) {
        return Err(AppError::RouteRejected(format!("action '{action}' not supported by the Vertex proxy")));
    }
    let model = model.strip_prefix("google/").unwrap_or(model);
    Ok(format!("/v1/publishers/google/models/{model}:{action}"))
}

pub fn method_for(action: &str) -> Method {
    match action {
        "countTokens" | "generateContent" | "streamGenerateContent" => Method::POST,
        _ => Method::POST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_path_and_strips_google_prefix() {
        assert_eq!(
            rewrite_path("google/gemini-3-flash", "generateContent").unwrap(),
            "/v1/publishers/google/models/gemini-3-flash:generateContent"
        );
    }

    #[test]
    fn rejects_disallowed_action() {
        assert!(rewrite_path("gemini-3-flash", "embedContent").is_err());
    }
}
