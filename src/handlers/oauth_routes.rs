//! Google account-linking flow (spec §4.3, §6): `GET /auth/google/login`
//! begins a PKCE authorization-code exchange and redirects the operator's
//! browser to Google; `GET /auth/google/callback` completes it and upserts
//! the resulting account. Both routes run unauthenticated, matching the
//! operator surface's own auth-exempt treatment — the state/PKCE pair is
//! the only thing standing between this and an open redirect.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::error::AppError;
use crate::handlers::state::AppState;
use crate::oauth::pkce::generate_pkce_params;

fn redirect_uri(headers: &HeaderMap) -> String {
    if let Ok(configured) = std::env::var("GOOGLE_REDIRECT_URI") {
        return configured;
    }
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost:8080");
    format!("http://{host}/auth/google/callback")
}

pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let client = state
        .google_oauth
        .as_ref()
        .ok_or_else(|| AppError::Config("Google OAuth is not configured (GOOGLE_CLIENT_ID unset)".to_string()))?;

    let params = generate_pkce_params();
    state.oauth_state.begin(params.state.clone(), params.code_verifier.clone());

    let url = client.authorization_url(&redirect_uri(&headers), &params.code_challenge, &params.state);
    Ok(Redirect::temporary(&url).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub async fn callback(State(state): State<AppState>, headers: HeaderMap, Query(query): Query<CallbackQuery>) -> Result<Response, AppError> {
    if let Some(err) = query.error {
        return Err(AppError::Config(format!("Google login denied: {err}")));
    }

    let client = state
        .google_oauth
        .as_ref()
        .ok_or_else(|| AppError::Config("Google OAuth is not configured (GOOGLE_CLIENT_ID unset)".to_string()))?;

    let code = query.code.ok_or_else(|| AppError::RouteRejected("missing 'code' query parameter".to_string()))?;
    let state_token = query.state.ok_or_else(|| AppError::RouteRejected("missing 'state' query parameter".to_string()))?;
    let verifier = state
        .oauth_state
        .take(&state_token)
        .ok_or_else(|| AppError::RouteRejected("unknown or expired OAuth state (possible replay)".to_string()))?;

    let exchanged = client.exchange_code(&code, &verifier, &redirect_uri(&headers)).await?;

    let account_id = format!("google-{}", exchanged.email.replace(['@', '.'], "-"));
    state
        .store
        .upsert_account(
            &account_id,
            &exchanged.email,
            "google",
            &exchanged.access_token,
            &exchanged.refresh_token,
            exchanged.expires_at,
            "{}",
        )
        .await?;

    state.token_manager.rebuild_cache().await?;

    Ok(axum::Json(serde_json::json!({
        "status": "linked",
        "email": exchanged.email,
        "account_id": account_id,
    }))
    .into_response())
}
