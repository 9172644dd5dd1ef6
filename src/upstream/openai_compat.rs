//! OpenAI-compatible catalog provider proxy (spec §4.6, §6): every catalog
//! entry speaks the same `POST {base_url}/chat/completions` surface, so one
//! client suffices for all of them — only the base URL, bearer key, and
//! static headers differ per [`crate::catalog::ProviderDescriptor`].

use crate::catalog::ProviderDescriptor;
use crate::error::AppError;

pub fn chat_completions_url(provider: &ProviderDescriptor) -> String {
    format!("{}/chat/completions", provider.base_url.trim_end_matches('/'))
}

pub fn bearer_key(provider: &ProviderDescriptor) -> Result<&str, AppError> {
    provider
        .api_key
        .as_deref()
        .ok_or_else(|| AppError::Config(format!("provider '{}' has no API key configured", provider.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelScope;
    use std::collections::HashMap;

    fn provider() -> ProviderDescriptor {
        ProviderDescriptor {
            id: "openrouter".to_string(),
            enabled: true,
            base_url: "https://openrouter.ai/api/v1/".to_string(),
            model_scope: ModelScope::AllModels,
            capabilities: vec![],
            static_headers: HashMap::new(),
            timeout_secs: 60,
            api_key: Some("sk-or-v1-xxx".to_string()),
        }
    }

    #[test]
    fn chat_completions_url_strips_trailing_slash() {
        assert_eq!(chat_completions_url(&provider()), "https://openrouter.ai/api/v1/chat/completions");
    }
}
