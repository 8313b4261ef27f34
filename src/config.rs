//! Service configuration.
//!
//! Tunables live in a TOML file (`wxmon.toml` by default); every section is
//! optional and falls back to defaults. Secrets never go in the file: the
//! database URL and provider API key are read from the environment, with a
//! `.env` file loaded first if present.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::ingest::openweather::OPENWEATHER_BASE_URL;
use crate::logging::LogLevel;
use crate::model::AlertThresholds;

pub const DEFAULT_CONFIG_PATH: &str = "./wxmon.toml";

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_API_KEY: &str = "OPENWEATHER_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid configuration in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid configuration in {path}: {reason}")]
    Invalid { path: String, reason: String },
    #[error("{0} must be set")]
    MissingEnv(&'static str),
}

// ---------------------------------------------------------------------------
// File sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceSection,
    pub provider: ProviderSection,
    pub logging: LoggingSection,
    pub defaults: AlertThresholds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    /// Minutes between check cycles in watch mode.
    pub poll_interval_minutes: u64,
    /// A stored observation older than this is refetched by `status`.
    pub stale_after_minutes: u64,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            poll_interval_minutes: 30,
            stale_after_minutes: 60,
        }
    }
}

impl ServiceSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes.saturating_mul(60))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: OPENWEATHER_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl ProviderSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: LogLevel,
    pub file: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate(origin)?;
        Ok(config)
    }

    fn validate(&self, origin: &str) -> Result<(), ConfigError> {
        if self.service.poll_interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                path: origin.to_string(),
                reason: "service.poll_interval_minutes must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Load configuration from `path`. A missing file yields the defaults;
    /// any other read error or a malformed file is reported.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let origin = path.display().to_string();

        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text, &origin),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: origin,
                source,
            }),
        }
    }
}

/// Secrets taken from the environment.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub database_url: Option<String>,
    pub api_key: Option<String>,
}

impl Secrets {
    /// Load `.env` (if any) and read the secret variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            database_url: env::var(ENV_DATABASE_URL).ok().filter(|v| !v.is_empty()),
            api_key: env::var(ENV_API_KEY).ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingEnv(ENV_DATABASE_URL))
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingEnv(ENV_API_KEY))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
