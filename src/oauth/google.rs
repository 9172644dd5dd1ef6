//! Google OAuth client (spec §4.3's account-creation path): authorization-code
//! + PKCE exchange against the Cloud Code OAuth application, reached through
//! the gateway's own `/auth/google/login` and `/auth/google/callback` routes
//! rather than a local CLI callback listener.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::AppError;
use crate::token_manager::{RefreshedToken, TokenRefresher};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/userinfo.email",
];

#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
}

impl GoogleOAuthConfig {
    /// Reads `GOOGLE_CLIENT_ID`/`GOOGLE_CLIENT_SECRET`; `None` when the former
    /// is unset, meaning the operator has not wired up Google login yet.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID").ok()?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET").ok();
        Some(Self { client_id, client_secret })
    }
}

pub struct GoogleOAuthClient {
    config: GoogleOAuthConfig,
    http: Client,
}

#[derive(Debug, Clone)]
pub struct ExchangedToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub email: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Deserialize)]
struct UserInfo {
    email: String,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleOAuthConfig) -> Self {
        Self { config, http: Client::new() }
    }

    pub fn authorization_url(&self, redirect_uri: &str, code_challenge: &str, state: &str) -> String {
        let mut url = url::Url::parse(AUTH_URL).expect("static auth url");
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", state)
            .append_pair("scope", &SCOPES.join(" "));
        url.to_string()
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<ExchangedToken, AppError> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri);
        params.insert("client_id", &self.config.client_id);
        params.insert("code_verifier", code_verifier);
        if let Some(secret) = &self.config.client_secret {
            params.insert("client_secret", secret);
        }

        let token = self.post_token(&params).await?;

        let email = self.fetch_email(&token.access_token).await?;
        Ok(ExchangedToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token.unwrap_or_default(),
            expires_at: Utc::now().timestamp() + token.expires_in,
            email,
        })
    }

    async fn post_token(&self, params: &HashMap<&str, &str>) -> Result<TokenResponse, AppError> {
        let resp = self
            .http
            .post(TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::UpstreamTransport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::UpstreamStatus { status, body, filtered_params: vec![] });
        }

        resp.json().await.map_err(|e| AppError::UpstreamTransport(e.to_string()))
    }

    async fn fetch_email(&self, access_token: &str) -> Result<String, AppError> {
        let resp = self
            .http
            .get("https://www.googleapis.com/oauth2/v2/userinfo")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::UpstreamTransport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(AppError::Config("failed to fetch Google account email".to_string()));
        }

        let info: UserInfo = resp.json().await.map_err(|e| AppError::UpstreamTransport(e.to_string()))?;
        Ok(info.email)
    }
}

#[async_trait]
impl TokenRefresher for GoogleOAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, String> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", self.config.client_id.as_str());
        if let Some(secret) = &self.config.client_secret {
            params.insert("client_secret", secret);
        }

        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(resp.text().await.unwrap_or_default());
        }

        let token: TokenResponse = resp.json().await.map_err(|e| e.to_string())?;
        Ok(RefreshedToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_url_carries_pkce_and_state() {
        let client = GoogleOAuthClient::new(GoogleOAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: None,
        });
        let url = client.authorization_url("http://localhost:8080/auth/google/callback", "chal", "state-1");
        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("code_challenge=chal"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("state=state-1"));
    }
}
