//! Configuration management for cfdi-lab.
//!
//! Handles loading configuration from TOML files and environment variables:
//! the backend base address, request timeout, health polling interval, and
//! the location of the state database.

use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Base address used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Environment variable naming the backend base address.
pub const ENV_API_URL: &str = "CFDI_LAB_API_URL";

/// Environment variable naming the deployment environment.
pub const ENV_ENVIRONMENT: &str = "CFDI_LAB_ENV";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Deployment environment: "local" (default) or "production".
    #[serde(default)]
    pub environment: Environment,

    /// Backend API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Path to the state database (defaults to the platform config dir).
    pub state_db: Option<PathBuf>,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Production,
}

impl Environment {
    /// Parses an environment name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "development" | "dev" => Some(Self::Local),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Backend API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base address of the backend (e.g., "https://lab.example.com/api").
    pub base_url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Health polling interval in milliseconds.
    #[serde(default = "default_health_interval_ms")]
    pub health_interval_ms: u64,
}

fn default_timeout_ms() -> u64 {
    8000
}

fn default_health_interval_ms() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
            health_interval_ms: default_health_interval_ms(),
        }
    }
}

impl ApiConfig {
    /// Applies environment variables as defaults for unset fields.
    pub fn apply_env_defaults(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.base_url.is_none() {
            self.base_url = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty());
        }
    }

    /// Resolves the final endpoint settings.
    ///
    /// A missing base address falls back to the local default. In a
    /// production environment that fallback is almost certainly wrong, so a
    /// warning is attached (startup still proceeds).
    pub fn resolve(&self, environment: Environment) -> Result<ResolvedApi> {
        let explicit = self.base_url.is_some();
        let raw = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let base_url = normalize_base_url(raw)?;

        let warning = if !explicit && environment == Environment::Production {
            let msg = format!(
                "{ENV_API_URL} is not set. Requests will go to {DEFAULT_BASE_URL}."
            );
            warn!("{}", msg);
            Some(msg)
        } else {
            None
        };

        if self.timeout_ms == 0 {
            return Err(LabError::config("api.timeout_ms must be greater than 0"));
        }
        if self.health_interval_ms == 0 {
            return Err(LabError::config(
                "api.health_interval_ms must be greater than 0",
            ));
        }

        Ok(ResolvedApi {
            base_url,
            timeout: Duration::from_millis(self.timeout_ms),
            health_interval: Duration::from_millis(self.health_interval_ms),
            warning,
        })
    }
}

/// Fully resolved backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedApi {
    /// Base address without trailing slash.
    pub base_url: String,
    pub timeout: Duration,
    pub health_interval: Duration,
    /// Visible warning about the configuration, if any.
    pub warning: Option<String>,
}

/// Validates a base address and strips trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed)
        .map_err(|e| LabError::config(format!("Invalid base URL '{trimmed}': {e}")))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(LabError::config(format!(
            "Invalid scheme '{}'. Expected 'http' or 'https'",
            url.scheme()
        )));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cfdi-lab")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| LabError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            LabError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies environment variables (`CFDI_LAB_API_URL`, `CFDI_LAB_ENV`).
    pub fn apply_env_defaults(&mut self) {
        if let Some(env) = std::env::var(ENV_ENVIRONMENT)
            .ok()
            .and_then(|v| Environment::parse(&v))
        {
            self.environment = env;
        }
        self.api.apply_env_defaults();
    }
}
