//! Provider catalog (C3): the OpenAI-compatible provider registry, loaded once
//! from YAML + environment at startup and exposed as capability queries to the
//! route resolver and the OpenAI-compatible upstream client.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelScope {
    AllModels,
    UnknownPrefixOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    #[serde(rename = "openai.chat")]
    OpenAiChat,
    #[serde(rename = "openai.responses")]
    OpenAiResponses,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEntry {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: String,
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,
    pub model_scope: ModelScope,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub static_headers: HashMap<String, String>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_auth_mode() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct RegistryFile {
    #[serde(default)]
    providers: Vec<ProviderEntry>,
}

/// Immutable-after-load provider descriptor (base url / key resolved from env).
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    pub id: String,
    pub enabled: bool,
    pub base_url: String,
    pub model_scope: ModelScope,
    pub capabilities: Vec<Capability>,
    pub static_headers: HashMap<String, String>,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl ProviderDescriptor {
    /// `RuntimeEnabled` iff enabled AND base-url present AND api-key present.
    pub fn runtime_enabled(&self) -> bool {
        self.enabled && !self.base_url.is_empty() && self.api_key.is_some()
    }

    pub fn accepts_model(&self, model: &str, is_known_prefix: bool) -> bool {
        if !self.runtime_enabled() {
            return false;
        }
        match self.model_scope {
            ModelScope::AllModels => true,
            ModelScope::UnknownPrefixOnly => !is_known_prefix,
        }
    }

    pub fn declares(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }
}

pub struct Catalog {
    providers: HashMap<String, ProviderDescriptor>,
}

impl Catalog {
    pub fn get(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.providers.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.values()
    }

    /// Providers whose scope accepts `model`, `model` here already lower-cased.
    pub fn providers_for_model(&self, model: &str, is_known_prefix: bool) -> Vec<String> {
        self.providers
            .values()
            .filter(|p| p.accepts_model(model, is_known_prefix))
            .map(|p| p.id.clone())
            .collect()
    }

    pub fn providers_with_capability(&self, cap: Capability) -> Vec<String> {
        self.providers
            .values()
            .filter(|p| p.runtime_enabled() && p.declares(cap))
            .map(|p| p.id.clone())
            .collect()
    }

    /// Loads the registry file per spec §6's search order, falling back to
    /// built-in defaults (`openrouter` all-models, `nvidia` unknown-prefix-only)
    /// when no file is found, then resolves base-url/api-key/timeout overrides
    /// from `NEXUS_<ID>_{API_KEY,BASE_URL,STATIC_HEADERS,TIMEOUT}`.
    pub fn load() -> Self {
        let file = Self::find_registry_file()
            .and_then(|p| std::fs::read_to_string(&p).ok())
            .and_then(|s| serde_yaml::from_str::<RegistryFile>(&s).ok());

        let entries = file.map(|f| f.providers).unwrap_or_else(default_providers);

        let mut providers = HashMap::new();
        for entry in entries {
            let descriptor = Self::resolve_env(entry);
            providers.insert(descriptor.id.clone(), descriptor);
        }

        Self { providers }
    }

    fn find_registry_file() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("NEXUS_OPENAI_COMPAT_PROVIDERS_FILE") {
            let p = PathBuf::from(path);
            if p.exists() {
                return Some(p);
            }
        }

        let mut candidates = vec![
            PathBuf::from("./config/openai_compat_providers.yaml"),
            PathBuf::from("/etc/nexus/openai_compat_providers.yaml"),
            PathBuf::from("/opt/homebrew/etc/nexus/openai_compat_providers.yaml"),
            PathBuf::from("/usr/local/etc/nexus/openai_compat_providers.yaml"),
        ];
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".config/nexus/openai_compat_providers.yaml"));
            candidates.push(home.join(".nexus/openai_compat_providers.yaml"));
        }

        candidates.into_iter().find(|p| p.exists())
    }

    fn env_prefix(id: &str) -> String {
        id.to_uppercase().replace(['-', '.', '/', ' '], "_")
    }

    fn resolve_env(entry: ProviderEntry) -> ProviderDescriptor {
        let prefix = Self::env_prefix(&entry.id);

        let api_key = std::env::var(format!("NEXUS_{}_API_KEY", prefix)).ok();
        let base_url = std::env::var(format!("NEXUS_{}_BASE_URL", prefix))
            .unwrap_or(entry.base_url);
        let timeout_secs = std::env::var(format!("NEXUS_{}_TIMEOUT", prefix))
            .ok()
            .and_then(|v| v.parse().ok())
            .or(entry.timeout)
            .unwrap_or(180);

        let mut static_headers = entry.static_headers;
        if let Ok(raw) = std::env::var(format!("NEXUS_{}_STATIC_HEADERS", prefix)) {
            if let Ok(extra) = serde_json::from_str::<HashMap<String, String>>(&raw) {
                static_headers.extend(extra);
            }
        }

        ProviderDescriptor {
            id: entry.id,
            enabled: entry.enabled,
            base_url,
            model_scope: entry.model_scope,
            capabilities: entry.capabilities,
            static_headers,
            timeout_secs,
            api_key,
        }
    }
}

fn default_providers() -> Vec<ProviderEntry> {
    vec![
        ProviderEntry {
            id: "openrouter".to_string(),
            enabled: true,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            auth_mode: "bearer".to_string(),
            model_scope: ModelScope::AllModels,
            capabilities: vec![Capability::OpenAiChat],
            static_headers: HashMap::new(),
            timeout: None,
        },
        ProviderEntry {
            id: "nvidia".to_string(),
            enabled: true,
            base_url: "https://integrate.api.nvidia.com/v1".to_string(),
            auth_mode: "bearer".to_string(),
            model_scope: ModelScope::UnknownPrefixOnly,
            capabilities: vec![Capability::OpenAiChat],
            static_headers: HashMap::new(),
            timeout: None,
        },
    ]
}

/// Known client-model prefixes per spec §4.1 — used to decide whether a
/// `model_scope: unknown_prefix_only` catalog provider may claim a model.
pub fn is_known_prefix(model: &str) -> bool {
    let m = model.to_lowercase();
    m.starts_with("gpt") || m.starts_with("gemini") || m.starts_with("claude")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_prefix_replaces_separators() {
        assert_eq!(Catalog::env_prefix("my-provider.id"), "MY_PROVIDER_ID");
    }

    #[test]
    fn nvidia_rejects_known_prefixes_but_accepts_custom() {
        let nvidia = ProviderDescriptor {
            id: "nvidia".to_string(),
            enabled: true,
            base_url: "https://x".to_string(),
            model_scope: ModelScope::UnknownPrefixOnly,
            capabilities: vec![Capability::OpenAiChat],
            static_headers: HashMap::new(),
            timeout_secs: 180,
            api_key: Some("k".to_string()),
        };
        assert!(!nvidia.accepts_model("gpt-4o", is_known_prefix("gpt-4o")));
        assert!(nvidia.accepts_model("my-custom", is_known_prefix("my-custom")));
    }

    #[test]
    fn default_providers_cover_openrouter_and_nvidia() {
        let entries = default_providers();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.contains(&"openrouter"));
        assert!(ids.contains(&"nvidia"));
    }
}
