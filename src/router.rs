//! Route resolver (C4): maps (client-model, protocol) to (target-provider,
//! target-model), enforcing provider/protocol/model compatibility rules.

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::catalog::{is_known_prefix, Capability, Catalog};
use crate::error::AppError;
use crate::store::{ModelRoute, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    OpenAi,
    GenAi,
    Anthropic,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::OpenAi => "openai",
            Protocol::GenAi => "genai",
            Protocol::Anthropic => "anthropic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub provider: String,
    pub model: String,
}

/// Route cache: a single pointer swap makes new routes visible to readers
/// with no tearing, per spec §5's shared-mutability rule.
pub struct Router {
    routes: ArcSwap<Vec<ModelRoute>>,
    catalog: Arc<Catalog>,
}

impl Router {
    pub fn new(routes: Vec<ModelRoute>, catalog: Arc<Catalog>) -> Self {
        Self {
            routes: ArcSwap::from_pointee(routes),
            catalog,
        }
    }

    pub async fn reload(&self, store: &Store) -> Result<(), AppError> {
        let routes = store.list_routes().await?;
        self.routes.store(Arc::new(routes));
        Ok(())
    }

    /// Case-insensitive lookup of the active route for `client_model`.
    /// Ties are broken by ascending primary key, i.e. the active row with
    /// the smallest `id` among matches.
    fn lookup(&self, client_model: &str) -> Option<ModelRoute> {
        let routes = self.routes.load();
        let needle = client_model.to_lowercase();
        routes
            .iter()
            .filter(|r| r.is_active && r.client_model.to_lowercase() == needle)
            .min_by_key(|r| r.id)
            .cloned()
    }

    /// `gpt*` -> {codex, google} ∪ catalog(model); `gemini*` -> {google, vertex,
    /// gemini}; `claude*` -> {google} ∪ catalog(model); otherwise {google} ∪
    /// catalog(model). Catalog providers contribute only when their
    /// model-scope accepts the model.
    pub fn allowed_providers_by_client_model(&self, model: &str) -> Vec<String> {
        let m = model.to_lowercase();
        let known = is_known_prefix(&m);
        let mut allowed: Vec<String> = if m.starts_with("gpt") {
            vec!["codex".to_string(), "google".to_string()]
        } else if m.starts_with("gemini") {
            vec!["google".to_string(), "vertex".to_string(), "gemini".to_string()]
        } else if m.starts_with("claude") {
            vec!["google".to_string()]
        } else {
            vec!["google".to_string()]
        };

        if !m.starts_with("gemini") {
            allowed.extend(self.catalog.providers_for_model(&m, known));
        }
        allowed
    }

    /// `openai` -> {google, codex} ∪ catalog providers declaring `openai.chat`;
    /// `genai` -> {google, vertex, gemini}; `anthropic` -> {google}.
    pub fn allowed_providers_by_protocol(&self, protocol: Protocol) -> Vec<String> {
        match protocol {
            Protocol::OpenAi => {
                let mut allowed = vec!["google".to_string(), "codex".to_string()];
                allowed.extend(self.catalog.providers_with_capability(Capability::OpenAiChat));
                allowed
            }
            Protocol::GenAi => vec!["google".to_string(), "vertex".to_string(), "gemini".to_string()],
            Protocol::Anthropic => vec!["google".to_string()],
        }
    }

    pub fn validate_route_provider(&self, client_model: &str, provider: &str) -> Result<(), AppError> {
        let allowed = self.allowed_providers_by_client_model(client_model);
        if allowed.iter().any(|p| p == provider) {
            Ok(())
        } else {
            Err(AppError::RouteRejected(format!(
                "provider '{}' not allowed for model '{}'; allowed: {:?}",
                provider, client_model, allowed
            )))
        }
    }

    /// Resolves a (client-model, protocol) pair to a (provider, model),
    /// cross-checking both allow-lists before returning.
    pub fn resolve(&self, client_model: &str, protocol: Protocol) -> Result<ResolvedRoute, AppError> {
        let route = self.lookup(client_model);

        let (provider, model) = match route {
            Some(r) => (normalize_provider(&r.target_provider), r.target_model.clone()),
            None => ("google".to_string(), client_model.to_string()),
        };

        let by_model = self.allowed_providers_by_client_model(client_model);
        let by_protocol = self.allowed_providers_by_protocol(protocol);

        if !by_model.iter().any(|p| p == &provider) || !by_protocol.iter().any(|p| p == &provider) {
            return Err(AppError::RouteRejected(format!(
                "provider '{}' not allowed for model '{}' on protocol '{}'; by_model={:?} by_protocol={:?}",
                provider, client_model, protocol.as_str(), by_model, by_protocol
            )));
        }

        Ok(ResolvedRoute { provider, model })
    }
}

fn normalize_provider(provider: &str) -> String {
    let lower = provider.to_lowercase();
    if lower.is_empty() {
        "google".to_string()
    } else {
        lower
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn empty_catalog() -> Arc<Catalog> {
        Arc::new(Catalog::load())
    }

    fn route(id: i64, client_model: &str, provider: &str, target: &str) -> ModelRoute {
        ModelRoute {
            id,
            client_model: client_model.to_string(),
            target_provider: provider.to_string(),
            target_model: target.to_string(),
            is_active: true,
            created_at: 0,
        }
    }

    #[test]
    fn route_fallback_ascending_id_tiebreak() {
        let routes = vec![
            route(1, "gpt-4", "google", "gemini-3-flash"),
            route(2, "gpt-4", "codex", "gpt-5.2"),
        ];
        let router = Router::new(routes, empty_catalog());
        let resolved = router.resolve("gpt-4", Protocol::OpenAi).unwrap();
        assert_eq!(resolved.provider, "google");
        assert_eq!(resolved.model, "gemini-3-flash");
    }

    #[test]
    fn protocol_rejection_vertex_not_allowed_for_openai() {
        let routes = vec![route(1, "gemini-3-flash-preview", "vertex", "gemini-3-flash-preview")];
        let router = Router::new(routes, empty_catalog());
        let result = router.resolve("gemini-3-flash-preview", Protocol::OpenAi);
        assert!(result.is_err());
    }

    #[test]
    fn no_route_defaults_to_google_passthrough() {
        let router = Router::new(vec![], empty_catalog());
        let resolved = router.resolve("some-unmapped-model", Protocol::OpenAi).unwrap();
        assert_eq!(resolved.provider, "google");
        assert_eq!(resolved.model, "some-unmapped-model");
    }

    #[test]
    fn validate_route_provider_custom_model_accepted_with_nvidia_key() {
        std::env::set_var("NEXUS_NVIDIA_API_KEY", "test-key");
        let catalog = Arc::new(Catalog::load());
        std::env::remove_var("NEXUS_NVIDIA_API_KEY");
        let router = Router::new(vec![], catalog);
        assert!(router.validate_route_provider("my-custom", "nvidia").is_ok());
        assert!(router.validate_route_provider("gpt-4o", "nvidia").is_err());
    }

    #[test]
    fn case_insensitive_lookup() {
        let routes = vec![route(1, "GPT-4", "google", "gemini-3-flash")];
        let router = Router::new(routes, empty_catalog());
        let resolved = router.resolve("gpt-4", Protocol::OpenAi).unwrap();
        assert_eq!(resolved.model, "gemini-3-flash");
    }

    #[test]
    fn empty_provider_normalizes_to_google() {
        assert_eq!(normalize_provider(""), "google");
        assert_eq!(normalize_provider("GOOGLE"), "google");
    }
}
