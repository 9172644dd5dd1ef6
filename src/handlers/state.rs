use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::monitor::Monitor;
use crate::oauth::{GoogleOAuthClient, OAuthStateStore};
use crate::router::Router;
use crate::store::Store;
use crate::token_manager::TokenManager;
use crate::upstream::cloud_code::CloudCodeClient;
use crate::upstream::codex::CodexClient;

/// Shared application state, constructed once at startup and cloned (cheaply,
/// via `Arc`) into every handler — spec §9's "explicitly-constructed
/// services, not ambient singletons" rule.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<ArcSwap<Config>>,
    pub catalog: Arc<Catalog>,
    pub router: Arc<Router>,
    pub token_manager: Arc<TokenManager>,
    pub monitor: Arc<Monitor>,
    pub cloud_code: Arc<CloudCodeClient>,
    pub codex_client: Arc<CodexClient>,
    pub http_client: reqwest::Client,
    pub oauth_state: Arc<OAuthStateStore>,
    pub google_oauth: Option<Arc<GoogleOAuthClient>>,
}
