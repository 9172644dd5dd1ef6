//! `GET /health` (SPEC_FULL §11): liveness of the store, the catalog, and the
//! token manager — the three things a request can't be served without.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use crate::handlers::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = state.store.api_key().await.is_ok();
    let accounts = state.token_manager.get_primary_or_default().await;
    let token_manager_ok = !matches!(accounts, Err(crate::error::AppError::Store(_)) | Err(crate::error::AppError::Internal(_)));
    let catalog_providers = state.catalog.all().count();

    let healthy = store_ok && token_manager_ok;
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "nexus-gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "store": store_ok,
            "token_manager": token_manager_ok,
            "catalog_providers": catalog_providers,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::handlers::state::AppState;
    use crate::monitor::Monitor;
    use crate::oauth::OAuthStateStore;
    use crate::router::Router;
    use crate::store::Store;
    use crate::token_manager::{RefreshedToken, TokenManager, TokenRefresher};
    use crate::upstream::cloud_code::CloudCodeClient;
    use crate::upstream::codex::CodexClient;
    use std::sync::Arc;
    use std::time::Duration;

    struct NoopRefresher;
    #[async_trait::async_trait]
    impl TokenRefresher for NoopRefresher {
        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, String> {
            Err("no accounts".to_string())
        }
    }

    #[tokio::test]
    async fn health_check_reports_ok_with_no_accounts() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let catalog = Arc::new(Catalog::load());
        let router = Arc::new(Router::new(vec![], catalog.clone()));
        let token_manager = Arc::new(TokenManager::new(store.clone(), Arc::new(NoopRefresher)).await.unwrap());
        let monitor = Arc::new(Monitor::new(store.clone()));

        let state = AppState {
            store: store.clone(),
            config: Arc::new(arc_swap::ArcSwap::from_pointee(crate::config::Config::default())),
            catalog,
            router,
            token_manager,
            monitor,
            cloud_code: Arc::new(CloudCodeClient::new(Duration::from_secs(60))),
            codex_client: Arc::new(CodexClient::new(Duration::from_secs(60))),
            http_client: reqwest::Client::new(),
            oauth_state: Arc::new(OAuthStateStore::new()),
            google_oauth: None,
        };

        let resp = health_check(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
