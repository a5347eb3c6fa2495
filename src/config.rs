//! Configuration management for the mining supervisor
//!
//! Command line flags select the miner and logging; a YAML or JSON file
//! supplies the miner registry, the hardware selection, the pool and the
//! reward target. CLI values win over file values; flags left at their
//! default give way to the file.

use crate::registry::MinerRegistry;
use crate::{Error, HardwareUnit, MinerDescriptor, PoolEndpoint, Result, RewardTarget};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    Plain,
    /// One JSON object per event
    Json,
}

/// Complete configuration for the supervisor
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "mining-supervisor",
    version = env!("CARGO_PKG_VERSION"),
    about = "Runs an external miner and supervises it until cancelled"
)]
pub struct Config {
    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(skip)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Miner to run, as registered in the configuration file
    #[arg(short = 'm', long)]
    #[serde(default)]
    pub miner: Option<String>,

    /// Algorithm to mine
    #[arg(short = 'a', long)]
    #[serde(default)]
    pub algorithm: Option<String>,

    /// Pool endpoint as host:port
    #[arg(short = 'o', long)]
    #[serde(default)]
    pub pool: Option<PoolEndpoint>,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, default_value = "plain")]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Write logs to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// How often external cancellation is checked (e.g. "1s", "500ms")
    #[arg(long, default_value = "1s")]
    #[serde(default = "default_watch_interval")]
    pub watch_interval: String,

    /// Registered miners
    #[arg(skip)]
    #[serde(default)]
    pub miners: Vec<MinerDescriptor>,

    /// Hardware selection, in device order
    #[arg(skip)]
    #[serde(default)]
    pub hardware: Vec<HardwareUnit>,

    /// Reward coin and address
    #[arg(skip)]
    #[serde(default)]
    pub reward: Option<RewardTarget>,
}

impl Config {
    /// Parse the command line, merge the config file and validate
    pub async fn load() -> Result<Self> {
        Self::parse().resolve().await
    }

    /// Merge the config file named by `config_file`, if any, and validate
    pub async fn resolve(self) -> Result<Self> {
        let config = match &self.config_file {
            Some(path) => {
                let file_config = Self::load_from_file(path).await?;
                self.merge_with_file(file_config)
            }
            None => self,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            // Default to YAML
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Merge CLI config with file config (CLI takes precedence)
    fn merge_with_file(mut self, file_config: Self) -> Self {
        if self.miner.is_none() {
            self.miner = file_config.miner;
        }
        if self.algorithm.is_none() {
            self.algorithm = file_config.algorithm;
        }
        if self.pool.is_none() {
            self.pool = file_config.pool;
        }
        if self.log_file.is_none() {
            self.log_file = file_config.log_file;
        }

        // Flags with clap defaults cannot tell "unset" from "set to the
        // default", so the file wins while they hold the default
        if self.log_level == default_log_level() {
            self.log_level = file_config.log_level;
        }
        if self.log_format == default_log_format() {
            self.log_format = file_config.log_format;
        }
        if self.watch_interval == default_watch_interval() {
            self.watch_interval = file_config.watch_interval;
        }

        // Only the file can describe these
        self.miners = file_config.miners;
        self.hardware = file_config.hardware;
        self.reward = file_config.reward;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let registry = self.registry();
        let miner = self.miner_name()?;
        if !registry.contains(miner) {
            return Err(Error::config(format!("Miner {} is not registered", miner)));
        }

        self.algorithm()?;

        let pool = self.pool()?;
        Url::parse(&pool.stratum_url())
            .map_err(|e| Error::config(format!("Invalid pool endpoint {}: {}", pool, e)))?;

        let reward = self.reward()?;
        if reward.coin.trim().is_empty() || reward.address.trim().is_empty() {
            return Err(Error::config("Reward coin and address are required"));
        }

        if self.watch_interval_duration()?.is_zero() {
            return Err(Error::config("Watch interval must be greater than 0"));
        }

        Ok(())
    }

    /// Registry built from the configured miners
    pub fn registry(&self) -> MinerRegistry {
        self.miners.iter().cloned().collect()
    }

    /// Selected miner name
    pub fn miner_name(&self) -> Result<&str> {
        self.miner
            .as_deref()
            .ok_or_else(|| Error::config("A miner must be selected"))
    }

    /// Selected algorithm
    pub fn algorithm(&self) -> Result<&str> {
        self.algorithm
            .as_deref()
            .ok_or_else(|| Error::config("An algorithm must be selected"))
    }

    /// Pool endpoint
    pub fn pool(&self) -> Result<&PoolEndpoint> {
        self.pool
            .as_ref()
            .ok_or_else(|| Error::config("A pool endpoint is required"))
    }

    /// Reward target
    pub fn reward(&self) -> Result<&RewardTarget> {
        self.reward
            .as_ref()
            .ok_or_else(|| Error::config("A reward target is required"))
    }

    /// Parsed watch interval
    pub fn watch_interval_duration(&self) -> Result<Duration> {
        humantime::parse_duration(&self.watch_interval).map_err(|e| {
            Error::config(format!("Invalid watch interval {}: {}", self.watch_interval, e))
        })
    }
}

// Default value functions for serde
fn default_log_level() -> LogLevel {
    LogLevel::Info
}
fn default_log_format() -> LogFormat {
    LogFormat::Plain
}
fn default_watch_interval() -> String {
    "1s".to_string()
}
