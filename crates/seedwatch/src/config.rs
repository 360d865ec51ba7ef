//! Configuration for seedwatch
//!
//! Resolution order (later wins):
//! 1. Built-in defaults
//! 2. `~/.seedwatch/config.toml` (or the file passed with `--config`)
//! 3. `SEEDWATCH_*` environment variables
//! 4. Command-line flags (applied by the binary)

use anyhow::{Context, Result};
use seedwatch_protocol::defaults::{
    ANALYSIS_POLL_INTERVAL, DEFAULT_BASE_URL, DEFAULT_ORGANIZATION_ID, DEFAULT_REQUEST_TIMEOUT,
    PROGRESS_POLL_INTERVAL,
};
use seedwatch_protocol::paths::default_config_path;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid base URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
}

/// Resolved client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// API root, e.g. `https://seed.example.org/api/v3/`
    pub base_url: String,
    pub organization_id: u64,
    pub analysis_poll_interval_ms: u64,
    pub progress_poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            organization_id: DEFAULT_ORGANIZATION_ID,
            analysis_poll_interval_ms: ANALYSIS_POLL_INTERVAL.as_millis() as u64,
            progress_poll_interval_ms: PROGRESS_POLL_INTERVAL.as_millis() as u64,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
        }
    }
}

impl WatchConfig {
    /// Load defaults, then the config file, then the process environment.
    ///
    /// An explicitly given path must exist; the default path is optional.
    /// Not validated: call [`WatchConfig::validate`] once command-line
    /// overrides have been applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `SEEDWATCH_*` overrides using the given lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SEEDWATCH_BASE_URL") {
            self.base_url = url;
        }
        if let Some(value) = env_u64(&lookup, "SEEDWATCH_ORGANIZATION_ID")? {
            self.organization_id = value;
        }
        if let Some(value) = env_u64(&lookup, "SEEDWATCH_ANALYSIS_POLL_MS")? {
            self.analysis_poll_interval_ms = value;
        }
        if let Some(value) = env_u64(&lookup, "SEEDWATCH_PROGRESS_POLL_MS")? {
            self.progress_poll_interval_ms = value;
        }
        if let Some(value) = env_u64(&lookup, "SEEDWATCH_REQUEST_TIMEOUT_MS")? {
            self.request_timeout_ms = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if self.analysis_poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("analysis_poll_interval_ms"));
        }
        if self.progress_poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("progress_poll_interval_ms"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroInterval("request_timeout_ms"));
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.base_url.clone(),
            source,
        })
    }

    pub fn analysis_poll_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_poll_interval_ms)
    }

    pub fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn env_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value,
            }),
    }
}
