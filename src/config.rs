use serde::{Deserialize, Serialize};

/// Server-level settings: host/port/logging/timeouts. Distinct from the
/// persistent store (accounts, routes, api key) and from the provider
/// catalog, both of which live elsewhere and reload independently.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
    #[serde(default = "default_db_path")]
    pub database_path: String,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_seconds: u64,
    #[serde(default = "default_catalog_timeout")]
    pub catalog_timeout_seconds: u64,
    #[serde(default = "default_callback_timeout")]
    pub oauth_callback_timeout_seconds: u64,
}

fn default_db_path() -> String {
    "./data/nexus.db".to_string()
}

fn default_upstream_timeout() -> u64 {
    300
}

fn default_catalog_timeout() -> u64 {
    180
}

fn default_callback_timeout() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            database_path: default_db_path(),
            upstream_timeout_seconds: default_upstream_timeout(),
            catalog_timeout_seconds: default_catalog_timeout(),
            oauth_callback_timeout_seconds: default_callback_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Body-logging / redaction knobs for the monitor's request-log capture.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_body_logging_enabled")]
    pub body_logging_enabled: bool,
    #[serde(default = "default_request_body_limit")]
    pub request_body_limit: usize,
    #[serde(default = "default_response_body_limit")]
    pub response_body_limit: usize,
    #[serde(default)]
    pub redact_patterns: Vec<RedactPattern>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            body_logging_enabled: default_body_logging_enabled(),
            request_body_limit: default_request_body_limit(),
            response_body_limit: default_response_body_limit(),
            redact_patterns: default_redact_patterns(),
        }
    }
}

fn default_body_logging_enabled() -> bool {
    true
}

/// 1 MiB, per spec §3's request-log truncation rule.
fn default_request_body_limit() -> usize {
    1024 * 1024
}

/// 512 KiB, per spec §3's request-log truncation rule.
fn default_response_body_limit() -> usize {
    512 * 1024
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedactPattern {
    pub pattern: String,
    pub replacement: String,
}

fn default_redact_patterns() -> Vec<RedactPattern> {
    vec![
        RedactPattern {
            pattern: r"sk-[a-zA-Z0-9]{20,}".to_string(),
            replacement: "sk-***REDACTED***".to_string(),
        },
        RedactPattern {
            pattern: r"Bearer [a-zA-Z0-9._-]+".to_string(),
            replacement: "Bearer ***REDACTED***".to_string(),
        },
        RedactPattern {
            pattern: r#""access_token"\s*:\s*"[^"]+""#.to_string(),
            replacement: r#""access_token":"***REDACTED***""#.to_string(),
        },
        RedactPattern {
            pattern: r#""refresh_token"\s*:\s*"[^"]+""#.to_string(),
            replacement: r#""refresh_token":"***REDACTED***""#.to_string(),
        },
    ]
}

/// Load server settings from an optional `config.toml` plus
/// `NEXUS__*`-prefixed environment overrides (teacher's
/// `Environment::with_prefix(...).separator("__")` pattern).
pub fn load_config() -> anyhow::Result<Config> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config").required(false))
        .add_source(config::Environment::with_prefix("NEXUS").separator("__"));

    match builder.build() {
        Ok(c) => Ok(c.try_deserialize().unwrap_or_default()),
        Err(_) => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_server_settings() {
        let cfg = Config::default();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host, "0.0.0.0");
    }

    #[test]
    fn default_body_limits_match_spec() {
        let obs = ObservabilityConfig::default();
        assert_eq!(obs.request_body_limit, 1024 * 1024);
        assert_eq!(obs.response_body_limit, 512 * 1024);
    }
}
