use crate::error::{ParritaError, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParritaConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Custom path for the SQLite database. Defaults to `~/.config/parrita/parrita.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_port")]
    pub port: u16,
    #[serde(default = "default_web_host")]
    pub host: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            host: default_web_host(),
        }
    }
}

/// The hosted LLM gateway the chat replies come from. Any
/// OpenAI-compatible `chat/completions` endpoint works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    #[serde(default = "default_gateway_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    #[serde(default)]
    pub env_var: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_base_url(),
            model: default_gateway_model(),
            api_key: None,
            env_var: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_window_minutes")]
    pub window_minutes: i64,
    #[serde(default = "default_rate_max_requests")]
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_rate_window_minutes(),
            max_requests: default_rate_max_requests(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// How many phase-1 examples to show before any context is detected.
    #[serde(default = "default_cold_start_limit")]
    pub cold_start_limit: usize,
    /// How many similar calls to inject once context is detected.
    #[serde(default = "default_matched_limit")]
    pub matched_limit: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            cold_start_limit: default_cold_start_limit(),
            matched_limit: default_matched_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// A conversation with more messages than this is considered qualified
    /// even without an email in the reply.
    #[serde(default = "default_qualification_threshold")]
    pub qualification_message_threshold: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: default_max_message_length(),
            qualification_message_threshold: default_qualification_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// -- Defaults --

fn default_web_port() -> u16 {
    8787
}
fn default_web_host() -> String {
    "127.0.0.1".to_string()
}
fn default_gateway_base_url() -> String {
    "https://ai.gateway.lovable.dev".to_string()
}
fn default_gateway_model() -> String {
    "google/gemini-2.5-flash".to_string()
}
fn default_rate_window_minutes() -> i64 {
    10
}
fn default_rate_max_requests() -> u32 {
    20
}
fn default_cold_start_limit() -> usize {
    7
}
fn default_matched_limit() -> usize {
    3
}
fn default_max_message_length() -> usize {
    5000
}
fn default_qualification_threshold() -> usize {
    8
}
fn default_true() -> bool {
    true
}

/// Default environment variable holding the gateway API key.
pub const GATEWAY_API_KEY_ENV: &str = "PARRITA_GATEWAY_API_KEY";

impl ParritaConfig {
    /// Load configuration with two-layer TOML merge:
    /// 1. ~/.config/parrita/config.toml (global)
    /// 2. <project_dir>/parrita.toml (project)
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        if let Some(dir) = project_dir {
            let project_config = dir.join("parrita.toml");
            if project_config.exists() {
                builder = builder.add_source(File::from(project_config).required(false));
            }
        }

        let config = builder
            .build()
            .map_err(|e| ParritaError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| ParritaError::Config(e.to_string()))?;

        cfg.validate();
        Ok(cfg)
    }

    /// Load with defaults only (no files).
    pub fn default_config() -> Self {
        Self {
            storage: StorageConfig::default(),
            web: WebConfig::default(),
            gateway: GatewayConfig::default(),
            rate_limit: RateLimitConfig::default(),
            enrichment: EnrichmentConfig::default(),
            chat: ChatConfig::default(),
            webhooks: WebhooksConfig::default(),
        }
    }

    /// Validate config values, clamping out-of-range values and logging warnings.
    /// This is lenient — it fixes values rather than rejecting the config.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.gateway.base_url.trim().is_empty() {
            warnings.push("gateway.base_url is empty, using default".to_string());
            self.gateway.base_url = default_gateway_base_url();
        }

        if self.rate_limit.window_minutes <= 0 {
            warnings.push(format!(
                "rate_limit.window_minutes = {}, setting to {}",
                self.rate_limit.window_minutes,
                default_rate_window_minutes()
            ));
            self.rate_limit.window_minutes = default_rate_window_minutes();
        }
        if self.rate_limit.max_requests == 0 {
            warnings.push("rate_limit.max_requests = 0, setting to 1".to_string());
            self.rate_limit.max_requests = 1;
        }

        if self.enrichment.cold_start_limit == 0 {
            warnings.push("enrichment.cold_start_limit = 0, setting to 1".to_string());
            self.enrichment.cold_start_limit = 1;
        }
        if self.enrichment.matched_limit == 0 {
            warnings.push("enrichment.matched_limit = 0, setting to 1".to_string());
            self.enrichment.matched_limit = 1;
        }

        if self.chat.max_message_length == 0 {
            warnings.push(format!(
                "chat.max_message_length = 0, setting to {}",
                default_max_message_length()
            ));
            self.chat.max_message_length = default_max_message_length();
        }

        for w in &warnings {
            tracing::warn!("config: {}", w);
        }
        warnings
    }
}

/// Global config path: `~/.config/parrita/config.toml`
fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("parrita").join("config.toml"))
}
