use crate::error::{ClientError, Result};
use serde::Deserialize;
use std::env;
use std::fs;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub version: String,
    /// Whole-request timeout enforced by the HTTP client
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub model: String,
    pub max_tokens: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| ClientError::ConfigError("ANTHROPIC_API_KEY not set".to_string()))?;

        let base_url = env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| default_base_url());
        let version = env::var("ANTHROPIC_VERSION").unwrap_or_else(|_| default_api_version());

        let timeout_secs = match env::var("ANTHROPIC_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                ClientError::ConfigError(format!("Invalid timeout value: {}", e))
            })?,
            Err(_) => default_timeout_secs(),
        };

        let mut defaults = DefaultsConfig::default();
        if let Ok(model) = env::var("ANTHROPIC_MODEL") {
            defaults.model = model;
        }

        Ok(ClientConfig {
            api: ApiConfig {
                api_key,
                base_url,
                version,
                timeout_secs,
            },
            defaults,
        })
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ClientError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&contents)?;

        // Allow environment variables to override file config
        if let Ok(api_key) = env::var("ANTHROPIC_API_KEY") {
            config.api.api_key = api_key;
        }

        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| ClientError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.api_key.is_empty() {
            return Err(ClientError::ConfigError("API key is empty".to_string()));
        }

        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(ClientError::ConfigError(format!(
                "Base URL must be http(s): {}",
                self.api.base_url
            )));
        }

        if self.api.version.is_empty() {
            return Err(ClientError::ConfigError("API version is empty".to_string()));
        }

        if self.api.timeout_secs == 0 {
            return Err(ClientError::ConfigError(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if self.defaults.max_tokens == 0 {
            return Err(ClientError::ConfigError(
                "Default max_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl ApiConfig {
    /// Full URL of the messages endpoint
    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}
