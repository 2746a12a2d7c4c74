use std::fmt;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::Deserialize;

use cropdoc_diagnosis::DetectorConfig;
use cropdoc_providers::{gemini, openai_compat};

/// CropDoc runtime configuration.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// HTTP server bind address
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    /// SQLite database path
    pub db_path: String,
    /// Which generation provider to use: "gemini" or "openai"
    pub provider: String,

    // Gemini
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,

    // OpenAI-compatible (OpenAI, OpenRouter)
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,

    /// Upper bound on fetching the uploaded image
    pub fetch_timeout_secs: u64,
    /// Upper bound on a single model call
    pub generation_timeout_secs: u64,

    /// Log level
    pub log_level: String,
    /// Directory for rolling NDJSON logs
    pub log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            db_path: "cropdoc.db".to_string(),
            provider: "gemini".to_string(),
            gemini_api_key: None,
            gemini_model: gemini::DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: gemini::DEFAULT_GEMINI_BASE_URL.to_string(),
            openai_api_key: None,
            openai_base_url: openai_compat::DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: openai_compat::DEFAULT_OPENAI_MODEL.to_string(),
            fetch_timeout_secs: 15,
            generation_timeout_secs: 60,
            log_level: "info".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("port", &self.port)
            .field("db_path", &self.db_path)
            .field("provider", &self.provider)
            .field("gemini_api_key", &redacted(&self.gemini_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("openai_api_key", &redacted(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("generation_timeout_secs", &self.generation_timeout_secs)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (useful for testing).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind_address: non_empty("CROPDOC_BIND").unwrap_or(defaults.bind_address),
            port: non_empty("CROPDOC_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            db_path: non_empty("CROPDOC_DB").unwrap_or(defaults.db_path),
            provider: non_empty("CROPDOC_PROVIDER")
                .map(|p| p.to_lowercase())
                .unwrap_or(defaults.provider),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: non_empty("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_base_url: non_empty("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            fetch_timeout_secs: non_empty("CROPDOC_FETCH_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fetch_timeout_secs),
            generation_timeout_secs: non_empty("CROPDOC_GENERATION_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.generation_timeout_secs),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_dir: non_empty("CROPDOC_LOG_DIR").unwrap_or(defaults.log_dir),
        }
    }

    /// Check that the selected provider is known and has credentials.
    pub fn validate(&self) -> Result<()> {
        match self.provider.as_str() {
            "gemini" if self.gemini_api_key.is_none() => {
                bail!("GEMINI_API_KEY must be set when CROPDOC_PROVIDER=gemini")
            }
            "openai" if self.openai_api_key.is_none() => {
                bail!("OPENAI_API_KEY must be set when CROPDOC_PROVIDER=openai")
            }
            "gemini" | "openai" => {}
            other => bail!("unknown CROPDOC_PROVIDER {other:?} (expected \"gemini\" or \"openai\")"),
        }
        if self.fetch_timeout_secs == 0 || self.generation_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            fetch_timeout: self.fetch_timeout(),
            generation_timeout: self.generation_timeout(),
        }
    }
}
