use crate::retry::RetryConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const BASE_URL_ENV: &str = "INBOX_ASSIST_BASE_URL";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            max_attempts: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub monitor: MonitorConfig,
}

impl Config {
    /// Reads `config.toml` from the working directory.
    pub fn new() -> Result<Self> {
        Self::from_path("config.toml")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml(&config_str)?;
        info!("Config: {:?}", config);
        Ok(config)
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::from_path`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_path(path)
        } else {
            info!("{} not found, using default configuration", path.display());
            Ok(Self::default())
        }
    }

    /// Applies `INBOX_ASSIST_BASE_URL` if it is set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.backend.base_url = url.to_string();
            }
        }
        self
    }

    /// Checks value ranges. Run again after applying overrides.
    pub fn validate(&self) -> Result<()> {
        let base_url = self.backend.base_url.trim();
        if base_url.is_empty() {
            anyhow::bail!("backend.base_url must not be empty");
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            anyhow::bail!("backend.base_url must start with http:// or https://, got {base_url:?}");
        }
        if self.backend.request_timeout_secs == 0 {
            anyhow::bail!("backend.request_timeout_secs must be positive");
        }
        if self.backend.max_attempts == 0 {
            anyhow::bail!("backend.max_attempts must be at least 1");
        }
        if self.monitor.poll_interval_secs == 0 {
            anyhow::bail!("monitor.poll_interval_secs must be positive");
        }
        Ok(())
    }
}
