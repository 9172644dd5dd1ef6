//! ChatGPT Codex upstream client (spec §4.7): a second, independent OAuth
//! lifecycle from the Google accounts the core [`crate::token_manager`]
//! manages — Codex reads/writes `~/.codex/auth.json` directly and refreshes
//! against `auth.openai.com` with a fixed, public client id.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

pub const CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";
const TOKEN_URL: &str = "https://auth.openai.com/oauth/token";
const RESPONSES_URL: &str = "https://chatgpt.com/backend-api/codex/responses";
const REFRESH_BEFORE_EXPIRY: i64 = 5 * 60;
const CODEX_VERSION: &str = "0.94.0";
const CODEX_USER_AGENT: &str = "codex_cli_rs/0.94.0 (Mac OS 26.0.1; arm64)";

/// Request fields the Codex backend rejects outright; stripped before the
/// call and surfaced to the caller via `X-Nexus-Codex-Filtered-Params`.
pub const FILTERED_PARAMS: &[&str] = &[
    "temperature",
    "top_p",
    "max_output_tokens",
    "max_completion_tokens",
    "max_tokens",
    "service_tier",
    "presence_penalty",
    "frequency_penalty",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodexAuth {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "account_id", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
}

fn auth_path() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(".codex").join("auth.json")
}

pub fn load_auth() -> Result<CodexAuth, AppError> {
    let path = auth_path();
    let text = std::fs::read_to_string(&path)
        .map_err(|e| AppError::Config(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&text).map_err(|e| AppError::Config(format!("parsing {}: {e}", path.display())))
}

#[cfg(unix)]
fn write_auth_file(path: &std::path::Path, contents: &str) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::write(path, contents)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn write_auth_file(path: &std::path::Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

pub fn save_auth(auth: &CodexAuth) -> Result<(), AppError> {
    let path = auth_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AppError::Config(e.to_string()))?;
    }
    let contents = serde_json::to_string_pretty(auth).map_err(|e| AppError::Config(e.to_string()))?;
    write_auth_file(&path, &contents).map_err(|e| AppError::Config(e.to_string()))
}

/// Decodes the unverified claims of a JWT's payload segment (no signature
/// check — the token was already minted by OpenAI's own auth server and is
/// only used here to read its `exp` claim).
pub fn decode_unverified_claims(jwt: &str) -> Result<Value, AppError> {
    let payload = jwt
        .split('.')
        .nth(1)
        .ok_or_else(|| AppError::Config("malformed JWT: missing payload segment".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| AppError::Config(format!("JWT payload not valid base64: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::Config(format!("JWT payload not valid JSON: {e}")))
}

fn expires_at(jwt: &str) -> Option<i64> {
    decode_unverified_claims(jwt).ok()?.get("exp")?.as_i64()
}

pub fn needs_refresh(jwt: &str) -> bool {
    match expires_at(jwt) {
        Some(exp) => exp - Utc::now().timestamp() < REFRESH_BEFORE_EXPIRY,
        None => true,
    }
}

/// Strips [`FILTERED_PARAMS`] from the outbound payload, returning the keys
/// that were actually present so the caller can surface them in a response
/// header.
pub fn strip_filtered_params(payload: &mut Value) -> Vec<String> {
    let mut removed = Vec::new();
    if let Some(obj) = payload.as_object_mut() {
        for key in FILTERED_PARAMS {
            if obj.remove(*key).is_some() {
                removed.push(key.to_string());
            }
        }
        obj.insert("stream".to_string(), Value::Bool(true));
        obj.insert("store".to_string(), Value::Bool(false));
    }
    removed
}

pub struct CodexClient {
    http: Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

impl CodexClient {
    pub fn new(timeout: Duration) -> Self {
        Self { http: Client::builder().timeout(timeout).build().expect("reqwest client") }
    }

    pub async fn refresh(&self, auth: &CodexAuth) -> Result<CodexAuth, AppError> {
        let body = serde_json::json!({
            "client_id": CLIENT_ID,
            "grant_type": "refresh_token",
            "refresh_token": auth.refresh_token,
        });

        let resp = self
            .http
            .post(TOKEN_URL)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::UpstreamTransport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::UpstreamStatus { status, body: text, filtered_params: vec![] });
        }

        let parsed: TokenResponse = resp.json().await.map_err(|e| AppError::UpstreamTransport(e.to_string()))?;
        Ok(CodexAuth {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token.unwrap_or_else(|| auth.refresh_token.clone()),
            account_id: auth.account_id.clone(),
        })
    }

    /// Sends a request to the Codex Responses endpoint, filtering
    /// unsupported params first.
    pub async fn responses(&self, access_token: &str, account_id: Option<&str>, mut payload: Value) -> Result<(Value, Vec<String>), AppError> {
        let filtered = strip_filtered_params(&mut payload);

        let mut builder = self
            .http
            .post(RESPONSES_URL)
            .bearer_auth(access_token)
            .header("Version", CODEX_VERSION)
            .header("Openai-Beta", "responses=experimental")
            .header("Originator", "codex_cli_rs")
            .header("User-Agent", CODEX_USER_AGENT)
            .header("Content-Type", "application/json");
        if let Some(account_id) = account_id {
            builder = builder.header("Chatgpt-Account-Id", account_id);
        }

        let resp = builder
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::UpstreamTransport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::UpstreamStatus { status, body, filtered_params: filtered });
        }

        let value: Value = resp.json().await.map_err(|e| AppError::UpstreamTransport(e.to_string()))?;
        Ok((value, filtered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn fake_jwt(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp }).to_string());
        format!("{header}.{payload}.sig")
    }

    #[test]
    fn decodes_unverified_claims_from_payload_segment() {
        let jwt = fake_jwt(1_999_999_999);
        let claims = decode_unverified_claims(&jwt).unwrap();
        assert_eq!(claims["exp"], 1_999_999_999);
    }

    #[test]
    fn needs_refresh_within_five_minutes_of_expiry() {
        let soon = Utc::now().timestamp() + 60;
        assert!(needs_refresh(&fake_jwt(soon)));
        let later = Utc::now().timestamp() + 3600;
        assert!(!needs_refresh(&fake_jwt(later)));
    }

    #[test]
    fn strips_filtered_params_and_reports_them() {
        let mut payload = serde_json::json!({
            "model": "gpt-5.2",
            "temperature": 0.7,
            "max_tokens": 100,
        });
        let removed = strip_filtered_params(&mut payload);
        assert!(removed.contains(&"temperature".to_string()));
        assert!(removed.contains(&"max_tokens".to_string()));
        assert_eq!(payload["stream"], true);
        assert_eq!(payload["store"], false);
        assert!(payload.get("temperature").is_none());
    }
}
