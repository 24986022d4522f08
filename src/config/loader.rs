//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::adapters::http::ServiceConfig;
use crate::application::CoordinatorConfig;
use crate::domain::{ChainRegistry, ChainRoute, StopLossFraction};

pub const QUOTE_API_KEY_ENV: &str = "QUOTE_API_KEY";
pub const SWAP_API_KEY_ENV: &str = "SWAP_API_KEY";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub monitor: MonitorSection,
    #[serde(default)]
    pub coordinator: CoordinatorSection,
    pub discovery: DiscoverySection,
    pub acquisition: AcquisitionSection,
    pub quote_service: ServiceSection,
    pub swap_service: ServiceSection,
    /// Blockchain name -> routing metadata
    pub chains: BTreeMap<String, ChainSection>,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub persistence: PersistenceSection,
}

/// Trailing stop-loss settings shared by every monitor
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    /// Drop from the high-water mark that triggers a sell (0.1 = 10%)
    pub stop_loss_fraction: Decimal,
    /// Delay after each poll
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

/// Sell execution settings
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorSection {
    /// Attempts per sell before the disposal is recorded as failed
    #[serde(default = "default_sell_attempts")]
    pub sell_attempts: u32,
    #[serde(default = "default_sell_retry_delay_secs")]
    pub sell_retry_delay_secs: u64,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            sell_attempts: default_sell_attempts(),
            sell_retry_delay_secs: default_sell_retry_delay_secs(),
        }
    }
}

/// External scraper invocation
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySection {
    /// Executable to run each cycle (`~` is expanded)
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_discovery_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_discovery_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcquisitionSection {
    /// Amount of the chain's quote asset spent per candidate
    pub buy_amount: Decimal,
}

/// Quote or swap service connection
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSection {
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl ServiceSection {
    /// Get API key with environment variable override.
    /// Checks `env_var` first, falls back to the config value.
    pub fn get_api_key(&self, env_var: &str) -> Option<String> {
        if let Ok(key) = std::env::var(env_var) {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.api_key.clone().filter(|k| !k.is_empty())
    }

    pub fn service_config(&self, env_var: &str) -> ServiceConfig {
        ServiceConfig {
            api_url: self.api_url.clone(),
            api_key: self.get_api_key(env_var),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainSection {
    pub chain_id: u64,
    pub dex_id: String,
    /// Stablecoin address positions are valued in
    pub quote_asset: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Checkpoints and liquidation manifests (disabled when `data_dir` is unset)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PersistenceSection {
    #[serde(default)]
    pub data_dir: Option<String>,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_sell_attempts() -> u32 {
    1
}

fn default_sell_retry_delay_secs() -> u64 {
    2
}

fn default_discovery_interval_secs() -> u64 {
    600
}

fn default_discovery_timeout_secs() -> u64 {
    120
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stop_loss_fraction()?;

        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if self.coordinator.sell_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "sell_attempts must be >= 1".to_string(),
            ));
        }

        if self.discovery.command.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "discovery command cannot be empty".to_string(),
            ));
        }

        if self.discovery.interval_secs == 0 || self.discovery.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(format!(
                "discovery interval_secs and timeout_secs must be > 0, got {} and {}",
                self.discovery.interval_secs, self.discovery.timeout_secs
            )));
        }

        if self.acquisition.buy_amount <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "buy_amount must be > 0, got {}",
                self.acquisition.buy_amount
            )));
        }

        for (name, service) in [("quote_service", &self.quote_service), ("swap_service", &self.swap_service)] {
            if service.api_url.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{}.api_url cannot be empty",
                    name
                )));
            }
        }

        if self.chains.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one [chains.<name>] table is required".to_string(),
            ));
        }

        for (name, chain) in &self.chains {
            if chain.dex_id.trim().is_empty() || chain.quote_asset.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "chain '{}' needs dex_id and quote_asset",
                    name
                )));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.logging.level
            )));
        }

        Ok(())
    }

    pub fn stop_loss_fraction(&self) -> Result<StopLossFraction, ConfigError> {
        StopLossFraction::new(self.monitor.stop_loss_fraction)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    pub fn coordinator_config(&self) -> Result<CoordinatorConfig, ConfigError> {
        Ok(CoordinatorConfig {
            stop_loss_fraction: self.stop_loss_fraction()?,
            poll_interval: Duration::from_secs(self.monitor.poll_interval_secs),
            sell_attempts: self.coordinator.sell_attempts,
            sell_retry_delay: Duration::from_secs(self.coordinator.sell_retry_delay_secs),
        })
    }

    /// Build the read-only chain registry from the `[chains]` tables
    pub fn chain_registry(&self) -> ChainRegistry {
        let mut registry = ChainRegistry::new();
        for (name, chain) in &self.chains {
            registry.insert(ChainRoute {
                blockchain: name.clone(),
                chain_id: chain.chain_id,
                dex_id: chain.dex_id.clone(),
                quote_asset: chain.quote_asset.clone(),
            });
        }
        registry
    }

    pub fn discovery_command(&self) -> String {
        shellexpand::tilde(&self.discovery.command).to_string()
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery.interval_secs)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery.timeout_secs)
    }

    /// Expanded data directory, if persistence is enabled
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.persistence
            .data_dir
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| PathBuf::from(shellexpand::tilde(d).to_string()))
    }
}
