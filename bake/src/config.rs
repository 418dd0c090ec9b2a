//! Configuration management for bake.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (BAKE_*)
//! 2. Config file (platform config dir, or $BAKE_CONFIG)
//! 3. Default values

use anyhow::{Context, Result};
use bake_core::session::SessionConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// BakeAssist API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Session monitoring settings
    #[serde(default)]
    pub session: SessionSettings,

    /// Paths
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL for the BakeAssist API
    #[serde(default = "default_api_url")]
    pub url: String,

    /// Rewrite an http:// URL to https://
    #[serde(default)]
    pub upgrade_insecure: bool,

    /// Profile fetch timeout in milliseconds
    #[serde(default = "default_profile_timeout_ms")]
    pub profile_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Monitor interval in seconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Session length assumed when the account has none configured
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: u32,

    /// Profile fetch retries at startup
    #[serde(default = "default_startup_retries")]
    pub startup_retries: u32,

    /// First startup retry delay in milliseconds
    #[serde(default = "default_startup_backoff_ms")]
    pub startup_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for bake data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Persisted credential file; `<data_dir>/credential` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_file: Option<PathBuf>,
}

impl PathsConfig {
    /// Where the credential is persisted
    pub fn credential_path(&self) -> PathBuf {
        self.credential_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("credential"))
    }
}

// Default value functions
fn default_api_url() -> String {
    std::env::var("BAKE_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

fn default_profile_timeout_ms() -> u64 {
    5000
}

fn default_tick_interval() -> u64 {
    5
}

fn default_duration_minutes() -> u32 {
    15
}

fn default_startup_retries() -> u32 {
    5
}

fn default_startup_backoff_ms() -> u64 {
    1000
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bakeassist")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            upgrade_insecure: false,
            profile_timeout_ms: default_profile_timeout_ms(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            default_duration_minutes: default_duration_minutes(),
            startup_retries: default_startup_retries(),
            startup_backoff_ms: default_startup_backoff_ms(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            credential_file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            session: SessionSettings::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Result<Self> {
        let mut config: Config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var("BAKE_API_URL") {
            config.api.url = url;
        }

        Ok(config)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("BAKE_CONFIG") {
            PathBuf::from(path)
        } else if let Some(proj_dirs) = ProjectDirs::from("computer", "bakeassist", "bake") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Session manager settings
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick_interval: Duration::from_secs(self.session.tick_interval_secs.max(1)),
            default_duration_minutes: self.session.default_duration_minutes,
            startup_retries: self.session.startup_retries,
            startup_backoff: Duration::from_millis(self.session.startup_backoff_ms),
            ..SessionConfig::default()
        }
    }

    pub fn profile_timeout(&self) -> Duration {
        Duration::from_millis(self.api.profile_timeout_ms)
    }
}
