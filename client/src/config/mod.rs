//! Configuration management
//!
//! This module handles loading, validation, and management of the client
//! configuration. Configuration is stored in TOML format at
//! ~/.deepresearch/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: log level
//! - **api**: research backend base URL and request timeout
//! - **polling**: status poll interval and failure policy
//! - **chat**: transient error banner lifetime, default research requirements
//! - **intent**: keyword set and length threshold for research detection
//!
//! # Environment
//!
//! `DEEPRESEARCH_API_BASE_URL` overrides `api.base_url` after the file is read.
//!
//! # Examples
//!
//! ```no_run
//! use deepresearch_client::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Backend: {}", config.api.base_url);
//! println!("Poll every {:?}", config.polling.interval());
//! # Ok(())
//! # }
//! ```

use sdk::errors::ClientError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the configured backend base URL
pub const BASE_URL_ENV: &str = "DEEPRESEARCH_API_BASE_URL";

/// Accepted poll interval range in milliseconds
const POLL_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 500..=60_000;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Core client settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Research backend settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Status poller settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Conversation settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// Research intent detection
    #[serde(default)]
    pub intent: IntentConfig,
}

/// Core client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Research backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Base URL every API path is appended to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Status poller configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingConfig {
    /// Delay between status fetches in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Stop polling after this many consecutive failed fetches.
    /// Absent means failures never stop the poller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_failures: Option<u32>,
}

/// Conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatConfig {
    /// How long a transient error stays visible, in seconds
    #[serde(default = "default_error_dismiss_secs")]
    pub error_dismiss_secs: u64,

    /// Requirements sent when the user gives none
    #[serde(default = "default_requirements")]
    pub default_requirements: String,
}

/// Research intent configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentConfig {
    /// Any of these (lowercased) marks a research request
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    /// Input must be strictly longer than this many characters
    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

// Default value functions
fn default_log_level() -> String {
    "warn".to_string()
}

fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    6000
}

fn default_error_dismiss_secs() -> u64 {
    3
}

fn default_requirements() -> String {
    "详细全面".to_string()
}

fn default_keywords() -> Vec<String> {
    [
        "研究",
        "分析",
        "调查",
        "调研",
        "报告",
        "research",
        "analyze",
        "investigate",
        "survey",
        "report",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

fn default_min_length() -> usize {
    10
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_consecutive_failures: None,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            error_dismiss_secs: default_error_dismiss_secs(),
            default_requirements: default_requirements(),
        }
    }
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            min_length: default_min_length(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            chat: ChatConfig::default(),
            intent: IntentConfig::default(),
        }
    }
}

impl PollingConfig {
    /// Poll interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ChatConfig {
    /// Transient error lifetime as a `Duration`
    pub fn error_dismiss(&self) -> Duration {
        Duration::from_secs(self.error_dismiss_secs)
    }
}

impl ApiConfig {
    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from the default location (~/.deepresearch/config.toml)
    ///
    /// If the configuration file doesn't exist, writes a default one first.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or written
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, ClientError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from_path(path: &Path) -> Result<Self, ClientError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text without touching the environment
    pub fn from_toml_str(contents: &str) -> Result<Self, ClientError> {
        let config = Self::parse(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(contents: &str) -> Result<Self, ClientError> {
        toml::from_str(contents)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, ClientError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ClientError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default();

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| ClientError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| ClientError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = config;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path (~/.deepresearch/config.toml)
    fn default_config_path() -> Result<PathBuf, ClientError> {
        let home = dirs::home_dir()
            .ok_or_else(|| ClientError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".deepresearch").join("config.toml"))
    }

    /// Apply `DEEPRESEARCH_API_BASE_URL` if it is set and non-empty
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url;
            }
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ClientError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(ClientError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "Invalid base_url '{}'. Must start with http:// or https://",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(ClientError::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !POLL_INTERVAL_RANGE_MS.contains(&self.polling.interval_ms) {
            return Err(ClientError::Config(format!(
                "interval_ms must be between {} and {}",
                POLL_INTERVAL_RANGE_MS.start(),
                POLL_INTERVAL_RANGE_MS.end()
            )));
        }

        if self.polling.max_consecutive_failures == Some(0) {
            return Err(ClientError::Config(
                "max_consecutive_failures must be at least 1 when set".to_string(),
            ));
        }

        if self.intent.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ClientError::Config(
                "intent.keywords must contain at least one keyword".to_string(),
            ));
        }

        Ok(())
    }
}
