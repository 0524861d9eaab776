//! Configuration management for Ledgerline

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// SHA-256 hex digests are 64 characters long; no difficulty above that can be met.
const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Leading `'0'` characters a sealed block hash must carry.
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    /// Balance every user identifier starts from.
    #[serde(default = "default_initial_allowance")]
    pub initial_allowance: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Drop a user's session when its current connection closes and
    /// rebroadcast the user list. Off by default: stale sessions persist.
    #[serde(default)]
    pub remove_on_disconnect: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProtocolConfig {
    /// Answer undecodable inbound frames with a generic `ERROR`.
    #[serde(default)]
    pub reply_to_malformed: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            initial_allowance: default_initial_allowance(),
        }
    }
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.network.host, self.network.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.host.trim().is_empty() {
            return Err(ConfigError::Invalid("network.host must not be empty".to_string()));
        }

        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "ledger.difficulty must be at most {} (got {})",
                MAX_DIFFICULTY, self.ledger.difficulty
            )));
        }

        if !self.ledger.initial_allowance.is_finite() {
            return Err(ConfigError::Invalid(
                "ledger.initial_allowance must be a finite number".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load `config.toml` from the working directory, falling back to defaults
/// when the file is absent.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let config: Config = match fs::read_to_string(path) {
        Ok(config_str) => toml::from_str(&config_str)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Config::default(),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    config.validate()?;
    Ok(config)
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_difficulty() -> usize {
    crate::miner::DEFAULT_DIFFICULTY
}

fn default_initial_allowance() -> f64 {
    crate::blockchain::DEFAULT_INITIAL_ALLOWANCE
}
