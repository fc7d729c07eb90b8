//! Configuration management for Literature Desk
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Legacy flat variables (PORT, SQLITE_PATH,
//!   OLLAMA_BASE_URL, OLLAMA_MODEL, USE_OLLAMA, OPENAI_API_KEY, ...)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// LLM backend configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Keyword post-processor configuration
    #[serde(default)]
    pub keywords: KeywordConfig,

    /// Query answerer configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origin ("*" allows any)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    /// Maximum accepted request body
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file path, or ":memory:"
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Which chat-completion backend to talk to
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendSelection {
    /// Cloud when a key is present and self-hosted is not forced
    #[default]
    Auto,
    Ollama,
    Openai,
}

/// The backend actually chosen after applying the selection rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Ollama,
    OpenAi,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: BackendSelection,

    /// Force the self-hosted backend in `auto` mode
    #[serde(default)]
    pub use_ollama: bool,

    /// Ollama base URL
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,

    /// Ollama model
    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI model
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// OpenAI-compatible API base
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    /// Sampling temperature where the backend honours it
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds; unset means wait indefinitely
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeywordConfig {
    /// Run the background keyword worker
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between scans when nothing triggers the worker
    #[serde(default = "default_keyword_poll_interval")]
    pub poll_interval_secs: u64,

    /// Upper bound on stored keywords per record
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Number of records (in list order) handed to the model
    #[serde(default = "default_context_records")]
    pub context_records: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5175 }
fn default_cors_origin() -> String { "http://localhost:5173".to_string() }
fn default_body_limit() -> usize { 1024 * 1024 }
fn default_db_path() -> String { "./data.db".to_string() }
fn default_max_connections() -> u32 { 4 }
fn default_ollama_base_url() -> String { "http://localhost:11434".to_string() }
fn default_ollama_model() -> String { "llama3.1".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_temperature() -> f32 { 0.2 }
fn default_enabled() -> bool { true }
fn default_keyword_poll_interval() -> u64 { 30 }
fn default_max_keywords() -> usize { 8 }
fn default_context_records() -> usize { 20 }
fn default_log_level() -> String { "info".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendSelection::default(),
            use_ollama: false,
            ollama_base_url: default_ollama_base_url(),
            ollama_model: default_ollama_model(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_base_url: default_openai_base_url(),
            temperature: default_temperature(),
            request_timeout_secs: None,
        }
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_secs: default_keyword_poll_interval(),
            max_keywords: default_max_keywords(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            context_records: default_context_records(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
            metrics_port: 0,
        }
    }
}

impl LlmConfig {
    /// The configured OpenAI key, ignoring blank values
    pub fn api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Resolve the backend selection against the available credentials.
    ///
    /// `auto` picks the cloud backend only when self-hosted is not forced and
    /// a key is present. An explicit `openai` stays cloud even without a key;
    /// calls then fail with a configuration error.
    pub fn resolve_backend(&self) -> BackendKind {
        match self.backend {
            BackendSelection::Ollama => BackendKind::Ollama,
            BackendSelection::Openai => BackendKind::OpenAi,
            BackendSelection::Auto => {
                if self.use_ollama || self.api_key().is_none() {
                    BackendKind::Ollama
                } else {
                    BackendKind::OpenAi
                }
            }
        }
    }

    /// Optional request timeout as Duration
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: AppConfig = config.try_deserialize()?;
        app.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(app)
    }

    /// Apply the legacy flat environment names.
    ///
    /// `lookup` is injected so tests do not have to touch the process env.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                ConfigError::Message(format!("PORT is not a valid port: {}", port))
            })?;
        }
        if let Some(path) = lookup("SQLITE_PATH") {
            self.database.path = path;
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.llm.ollama_base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.llm.ollama_model = model;
        }
        if let Some(flag) = lookup("USE_OLLAMA") {
            self.llm.use_ollama = flag.trim() == "true";
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.llm.openai_model = model;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.openai_base_url = url;
        }
        Ok(())
    }

    /// Poll interval of the keyword worker as Duration
    pub fn keyword_poll_interval(&self) -> Duration {
        Duration::from_secs(self.keywords.poll_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5175);
        assert_eq!(config.database.path, "./data.db");
        assert_eq!(config.llm.ollama_model, "llama3.1");
        assert_eq!(config.query.context_records, 20);
        assert!(config.llm.request_timeout().is_none());
    }

    #[test]
    fn test_auto_without_key_is_self_hosted() {
        let config = AppConfig::default();
        assert_eq!(config.llm.resolve_backend(), BackendKind::Ollama);
    }

    #[test]
    fn test_auto_with_key_is_cloud_unless_forced() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(lookup(&[("OPENAI_API_KEY", "sk-test")]))
            .unwrap();
        assert_eq!(config.llm.resolve_backend(), BackendKind::OpenAi);

        config
            .apply_env_overrides(lookup(&[("USE_OLLAMA", "true")]))
            .unwrap();
        assert_eq!(config.llm.resolve_backend(), BackendKind::Ollama);
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let mut config = AppConfig::default();
        config.llm.openai_api_key = Some("   ".into());
        assert!(config.llm.api_key().is_none());
        assert_eq!(config.llm.resolve_backend(), BackendKind::Ollama);

        config.llm.backend = BackendSelection::Openai;
        assert_eq!(config.llm.resolve_backend(), BackendKind::OpenAi);
    }

    #[test]
    fn test_flat_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(lookup(&[
                ("PORT", "8088"),
                ("SQLITE_PATH", "/tmp/notes.db"),
                ("OLLAMA_BASE_URL", "http://gpu-box:11434"),
                ("OLLAMA_MODEL", "mistral"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.database.path, "/tmp/notes.db");
        assert_eq!(config.llm.ollama_base_url, "http://gpu-box:11434");
        assert_eq!(config.llm.ollama_model, "mistral");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(lookup(&[("PORT", "not-a-port")]));
        assert!(result.is_err());
    }
}
