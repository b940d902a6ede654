//! Configuration management for Postino
//!
//! Configuration is read once at process start and passed around by
//! reference; nothing mutates it afterwards.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::types::Platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub pinterest: PinterestConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bearer token for the publishing service.
    pub key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bound timeout for every request to the publishing service.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Per-platform account bindings at the publishing service.
///
/// A platform with no binding (or an empty one) is excluded from fan-outs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountsConfig {
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub twitter: Option<String>,
    pub pinterest: Option<String>,
}

impl AccountsConfig {
    pub fn account_id(&self, platform: Platform) -> Option<&str> {
        let id = match platform {
            Platform::Facebook => &self.facebook,
            Platform::Instagram => &self.instagram,
            Platform::Linkedin => &self.linkedin,
            Platform::Twitter => &self.twitter,
            Platform::Pinterest => &self.pinterest,
        };
        id.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinterestConfig {
    /// Board used when a post supplies none.
    pub default_board: Option<String>,
    /// Canonical link attached to pins when a post supplies none.
    pub default_link: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Public base address used to rewrite relative media URLs before they
    /// are handed to the publishing service.
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Named source timezone for operator input/output.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl ScheduleConfig {
    pub fn tz(&self) -> Result<Tz> {
        crate::scheduling::parse_timezone(&self.timezone)
    }
}

fn default_base_url() -> String {
    "https://api.getlate.dev/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_timezone() -> String {
    "Europe/Rome".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        if config.api.key.trim().is_empty() {
            return Err(ConfigError::MissingField("api.key".to_string()).into());
        }
        Ok(config)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("POSTINO_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("postino").join("config.toml"))
}
