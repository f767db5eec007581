use medivault_shared::Masked;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub interactions: InteractionsConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: Masked<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout_secs() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// Process-local tables, for demos and tests. Nothing survives a restart.
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InteractionsConfig {
    /// Base URL of the knowledge-base retrieval service. Unset means lookups report "unknown".
    pub endpoint: Option<String>,
    #[serde(default)]
    pub knowledge_base_id: String,
    pub api_key: Option<Masked<String>>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,
    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: usize,
    #[serde(default = "default_breaker_reset_secs")]
    pub breaker_reset_secs: u64,
}

fn default_timeout_ms() -> u64 { 5000 }
fn default_max_results() -> u32 { 5 }
fn default_max_concurrent_lookups() -> usize { 4 }
fn default_breaker_failure_threshold() -> usize { 5 }
fn default_breaker_reset_secs() -> u64 { 30 }

impl Default for InteractionsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            knowledge_base_id: String::new(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            max_results: default_max_results(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_reset_secs: default_breaker_reset_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5000".to_string(),
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:5000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `MEDIVAULT__DATABASE__URL=postgres://...` sets `database.url`
            .add_source(config::Environment::with_prefix("MEDIVAULT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
