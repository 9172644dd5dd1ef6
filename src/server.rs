//! Builds the shared [`AppState`](handlers::state::AppState) and the axum
//! `Router` that wires every surface from spec §6, then serves it with
//! graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{self, AuthState};
use crate::catalog::Catalog;
use crate::config::Config;
use crate::handlers;
use crate::handlers::state::AppState;
use crate::monitor::Monitor;
use crate::oauth::{GoogleOAuthClient, GoogleOAuthConfig, OAuthStateStore};
use crate::router::Router as ModelRouter;
use crate::signals;
use crate::store::Store;
use crate::token_manager::{RefreshedToken, TokenManager, TokenRefresher};
use crate::upstream::cloud_code::CloudCodeClient;
use crate::upstream::codex::CodexClient;

/// Refreshes nothing; installed when no OAuth provider is configured so
/// [`TokenManager`] always has a refresher to hold, even with zero accounts.
struct UnconfiguredRefresher;

#[async_trait::async_trait]
impl TokenRefresher for UnconfiguredRefresher {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, String> {
        Err("no OAuth provider is configured (GOOGLE_CLIENT_ID unset)".to_string())
    }
}

/// Constructs every long-lived component and wires them into [`AppState`].
/// Shared by the server's `start` path and any CLI command that needs live
/// access to the store/router/token-manager (`accounts`, `routes`, `test`).
pub async fn build_state(config: &Config) -> Result<AppState> {
    let store = Arc::new(Store::connect(&config.server.database_path).await.context("failed to open the account/route store")?);
    let catalog = Arc::new(Catalog::load());
    let routes = store.list_routes().await.context("failed to load model routes")?;
    let router = Arc::new(ModelRouter::new(routes, catalog.clone()));

    let google_oauth = GoogleOAuthConfig::from_env().map(|cfg| Arc::new(GoogleOAuthClient::new(cfg)));
    let refresher: Arc<dyn TokenRefresher> = match &google_oauth {
        Some(client) => client.clone() as Arc<dyn TokenRefresher>,
        None => Arc::new(UnconfiguredRefresher),
    };
    let token_manager = Arc::new(
        TokenManager::new(store.clone(), refresher)
            .await
            .context("failed to initialize the token manager")?,
    );

    let monitor = Arc::new(Monitor::new(store.clone()));
    let timeout = Duration::from_secs(config.server.upstream_timeout_seconds);

    Ok(AppState {
        store,
        config: Arc::new(ArcSwap::from_pointee(config.clone())),
        catalog,
        router,
        token_manager,
        monitor,
        cloud_code: Arc::new(CloudCodeClient::new(timeout)),
        codex_client: Arc::new(CodexClient::new(timeout)),
        http_client: reqwest::Client::new(),
        oauth_state: Arc::new(OAuthStateStore::new()),
        google_oauth,
    })
}

/// Builds the full axum `Router`: client-facing dialects, transparent
/// proxies, the operator surface, and the ambient `/health`/`/metrics` pair.
/// `/api/*` and `/auth/*` sit outside the API-key middleware — see spec §6's
/// note that the operator surface is a collaborator boundary, not a
/// client-facing one.
pub fn build_router(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let client_facing = Router::new()
        .route("/v1/chat/completions", post(handlers::openai::chat_completions))
        .route("/v1/models", get(handlers::openai::list_models))
        .route("/anthropic/v1/messages", post(handlers::anthropic::messages))
        .route("/genai/v1beta/models/:model_action", post(handlers::genai::generate_content))
        .route("/v1beta/models", get(handlers::gemini_transparent::list_models))
        .route(
            "/v1beta/models/:model_action",
            get(handlers::gemini_transparent::get_model).post(handlers::gemini_transparent::model_action),
        )
        .route("/v1beta/openai/chat/completions", post(handlers::gemini_transparent::openai_compat_chat))
        .route("/v1/publishers/google/models/:model_action", post(handlers::vertex_transparent::model_action))
        .route("/:provider/v1/chat/completions", post(handlers::catalog_proxy::chat_completions))
        .route_layer(middleware::from_fn_with_state(
            AuthState { store: state.store.clone() },
            auth::auth_middleware,
        ));

    let operator = Router::new()
        .route("/auth/google/login", get(handlers::oauth_routes::login))
        .route("/auth/google/callback", get(handlers::oauth_routes::callback))
        .route("/api/accounts", get(handlers::operator::list_accounts))
        .route("/api/accounts/:id/promote", post(handlers::operator::promote_account))
        .route("/api/accounts/:id/refresh", post(handlers::operator::refresh_account))
        .route("/api/config/apikey", get(handlers::operator::get_api_key))
        .route("/api/config/apikey/regenerate", post(handlers::operator::regenerate_api_key))
        .route(
            "/api/model-routes",
            get(handlers::operator::list_routes).post(handlers::operator::add_route),
        )
        .route("/api/model-routes/:id", axum::routing::delete(handlers::operator::remove_route))
        .route("/api/model-routes/reset", post(handlers::operator::reset_routes))
        .route("/api/test", get(handlers::operator::test_endpoint))
        .route("/api/support-status", get(handlers::operator::support_status));

    let ambient = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(move || { let handle = metrics_handle.clone(); async move { handle.render() } }));

    Router::new()
        .merge(client_facing)
        .merge(operator)
        .merge(ambient)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the gateway until SIGTERM/SIGINT, then drains in-flight requests and
/// stops the token refresh loop before returning.
pub async fn run(config: Config) -> Result<()> {
    info!(host = %config.server.host, port = config.server.port, "nexus-gateway starting");

    let state = build_state(&config).await?;
    let metrics_handle = crate::metrics::init_metrics();
    crate::metrics::update_active_accounts(state.store.active_accounts().await.map(|a| a.len()).unwrap_or(0));

    let shutdown_tx = signals::install();
    signals::install_reload(state.router.clone(), state.store.clone(), state.token_manager.clone());
    state.token_manager.clone().start_refresh_loop(shutdown_tx.subscribe());

    let app = build_router(state, metrics_handle);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    let mut shutdown_rx = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("graceful shutdown: draining in-flight requests");
        })
        .await
        .context("server error")?;

    Ok(())
}
