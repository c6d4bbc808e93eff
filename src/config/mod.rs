//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::calculate::CategoryBins;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Decklist source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the JSON decklist service. Local files are used when unset.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Fixed delay between requests
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Max retries on retryable errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_rate_limit() -> u64 {
    300
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            rate_limit_ms: default_rate_limit(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Right-closed percentage bin edges for Tech, Standard and Core
    #[serde(default = "default_category_bins")]
    pub category_bins: Vec<i32>,

    /// Minority copy share (percent) at which a core card is flexible
    #[serde(default = "default_flexible_core_threshold")]
    pub flexible_core_threshold: u32,
}

fn default_category_bins() -> Vec<i32> {
    vec![-1, 25, 79, 100]
}

fn default_flexible_core_threshold() -> u32 {
    25
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            category_bins: default_category_bins(),
            flexible_core_threshold: default_flexible_core_threshold(),
        }
    }
}

/// Cache behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries older than this are treated as stale on read
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,

    /// Keep raw samples in the durable tier, not just the analysis
    #[serde(default = "default_persist_raw")]
    pub persist_raw: bool,
}

fn default_stale_after_hours() -> u64 {
    24 * 14
}

fn default_persist_raw() -> bool {
    true
}

impl CacheConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_hours * 3600)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after_hours: default_stale_after_hours(),
            persist_raw: default_persist_raw(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Incremental tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Interval between update passes in watch mode, e.g. "6h"
    #[serde(default = "default_update_interval")]
    pub update_interval: String,
}

fn default_update_interval() -> String {
    "6h".to_string()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            source: SourceConfig::default(),
            analysis: AnalysisConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            tracking: TrackingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        CategoryBins::new(&self.analysis.category_bins)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.analysis.flexible_core_threshold > 100 {
            return Err(ConfigError::ValidationError(
                "Flexible core threshold must be a percentage".to_string(),
            ));
        }

        if self.source.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Source timeout must be greater than 0".to_string(),
            ));
        }

        if self.source.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "Backoff multiplier must be at least 1.0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if crate::parse_duration(&self.tracking.update_interval).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid update interval: {}",
                self.tracking.update_interval
            )));
        }

        Ok(())
    }
}
