//! Operator surface (spec §6): account management, the shared API key, the
//! model-route table, and a couple of diagnostic endpoints. Unauthenticated
//! by current design (see spec §6's "documented here as a collaborator
//! boundary" note) — this surface is meant to sit behind a private network
//! or reverse-proxy auth layer, not the client-facing API key.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::state::AppState;
use crate::router::Protocol;
use crate::store::Account;

#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: String,
    pub email: String,
    pub provider: String,
    pub is_active: bool,
    pub is_primary: bool,
    pub expires_at: i64,
    pub last_used_at: Option<i64>,
}

impl From<Account> for AccountView {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            email: a.email,
            provider: a.provider,
            is_active: a.is_active,
            is_primary: a.is_primary,
            expires_at: a.expires_at,
            last_used_at: a.last_used_at,
        }
    }
}

/// `GET /api/accounts` — never returns access/refresh tokens to the caller.
pub async fn list_accounts(State(state): State<AppState>) -> Result<Json<Vec<AccountView>>, AppError> {
    let accounts = state.store.list_accounts().await?;
    Ok(Json(accounts.into_iter().map(AccountView::from).collect()))
}

async fn require_account(state: &AppState, id: &str) -> Result<Account, AppError> {
    state
        .store
        .get_account(id)
        .await?
        .ok_or_else(|| AppError::RouteRejected(format!("unknown account '{id}'")))
}

/// `POST /api/accounts/{id}/promote` — makes `id` the primary account,
/// demoting any other, then rebuilds the token cache so the next request
/// picks it up immediately.
pub async fn promote_account(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<AccountView>, AppError> {
    require_account(&state, &id).await?;
    state.store.promote_account(&id).await?;
    state.token_manager.rebuild_cache().await?;
    let account = require_account(&state, &id).await?;
    Ok(Json(AccountView::from(account)))
}

/// `POST /api/accounts/{id}/refresh` — forces an immediate token refresh
/// regardless of the cached token's freshness, surfacing
/// [`AppError::PermanentAuthFailure`] as-is if the refresh token is dead.
pub async fn refresh_account(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>, AppError> {
    require_account(&state, &id).await?;
    let token = state.token_manager.force_refresh(&id).await?;
    Ok(Json(serde_json::json!({
        "account_id": token.account_id,
        "expires_at": token.expires_at,
    })))
}

#[derive(Debug, Serialize)]
pub struct ApiKeyView {
    pub api_key: Option<String>,
}

/// `GET /api/config/apikey` — the shared client-facing key; `None` means
/// every request currently passes unauthenticated (spec §6's auth rule).
pub async fn get_api_key(State(state): State<AppState>) -> Result<Json<ApiKeyView>, AppError> {
    let api_key = state.store.api_key().await?;
    Ok(Json(ApiKeyView { api_key }))
}

/// `POST /api/config/apikey/regenerate` — mints a fresh `sk-`-prefixed key
/// and persists it, immediately invalidating the previous one.
pub async fn regenerate_api_key(State(state): State<AppState>) -> Result<Json<ApiKeyView>, AppError> {
    let mut bytes = [0u8; 16];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    let key = format!("sk-{}", hex::encode(bytes));
    state.store.set_config("api_key", &key).await?;
    tracing::info!("operator regenerated the shared API key");
    Ok(Json(ApiKeyView { api_key: Some(key) }))
}

/// `GET /api/model-routes`
pub async fn list_routes(State(state): State<AppState>) -> Result<Json<Vec<crate::store::ModelRoute>>, AppError> {
    Ok(Json(state.store.list_routes().await?))
}

#[derive(Debug, Deserialize)]
pub struct AddRouteRequest {
    pub client_model: String,
    pub target_provider: String,
    pub target_model: String,
}

/// `POST /api/model-routes` — upserts on `(client_model, target_provider)`
/// and reloads the route resolver's atomic snapshot.
pub async fn add_route(State(state): State<AppState>, Json(req): Json<AddRouteRequest>) -> Result<Json<serde_json::Value>, AppError> {
    let id = state.store.add_route(&req.client_model, &req.target_provider, &req.target_model).await?;
    state.router.reload(&state.store).await?;
    Ok(Json(serde_json::json!({ "id": id })))
}

/// `DELETE /api/model-routes/{id}`
pub async fn remove_route(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<serde_json::Value>, AppError> {
    state.store.remove_route(id).await?;
    state.router.reload(&state.store).await?;
    Ok(Json(serde_json::json!({ "status": "removed" })))
}

/// `POST /api/model-routes/reset` — clears every manual route, reverting to
/// the router's built-in provider/protocol allow-list fallback.
pub async fn reset_routes(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.store.reset_routes().await?;
    state.router.reload(&state.store).await?;
    Ok(Json(serde_json::json!({ "status": "reset" })))
}

#[derive(Debug, Deserialize)]
pub struct TestQuery {
    pub endpoint: String,
}

#[derive(Debug, Serialize)]
pub struct TestResult {
    pub endpoint: String,
    pub provider: String,
    pub target_model: String,
    pub token_available: bool,
}

/// `GET /api/test?endpoint=<model>` — dry-runs route resolution and token
/// acquisition for a client model id without making an upstream call,
/// matching the CLI's `test --endpoint` subcommand (SPEC_FULL §10.4).
pub async fn test_endpoint(State(state): State<AppState>, Query(query): Query<TestQuery>) -> Result<Json<TestResult>, AppError> {
    let resolved = state.router.resolve(&query.endpoint, Protocol::OpenAi)?;
    let token_available = state.token_manager.get_primary_or_default().await.is_ok();
    Ok(Json(TestResult {
        endpoint: query.endpoint,
        provider: resolved.provider,
        target_model: resolved.model,
        token_available,
    }))
}

#[derive(Debug, Serialize)]
pub struct SupportStatus {
    pub active_accounts: usize,
    pub primary_account_email: Option<String>,
    pub catalog_providers_enabled: usize,
    pub codex_auth_present: bool,
    pub vertex_configured: bool,
    pub gemini_configured: bool,
}

/// `GET /api/support-status` — a one-shot diagnostic snapshot an operator
/// can paste into a support request without exposing any secret material.
pub async fn support_status(State(state): State<AppState>) -> Result<Json<SupportStatus>, AppError> {
    let accounts = state.store.active_accounts().await?;
    let primary_account_email = accounts.iter().find(|a| a.is_primary).map(|a| a.email.clone());
    let catalog_providers_enabled = state.catalog.all().filter(|p| p.runtime_enabled()).count();

    Ok(Json(SupportStatus {
        active_accounts: accounts.len(),
        primary_account_email,
        catalog_providers_enabled,
        codex_auth_present: crate::upstream::codex::load_auth().is_ok(),
        vertex_configured: crate::upstream::vertex::api_key().is_some(),
        gemini_configured: crate::upstream::gemini_proxy::api_key().is_some(),
    }))
}
