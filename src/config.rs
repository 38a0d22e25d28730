use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::blockchain::pow::DEFAULT_DIFFICULTY;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Node settings, read once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Address the HTTP server binds to
    pub host: String,

    /// Port the HTTP server listens on
    pub port: u16,

    /// Leading zeros required by the proof of work
    pub difficulty: usize,

    /// Amount paid to this node for each mined block
    pub mining_reward: f64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            host: "127.0.0.1".to_string(),
            port: 5000,
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: 1.0,
        }
    }
}

impl NodeConfig {
    /// Loads the configuration from the process environment
    ///
    /// Reads `HOST`, `PORT`, `POW_DIFFICULTY` and `MINING_REWARD`; unset
    /// variables fall back to the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = NodeConfig::default();

        Ok(NodeConfig {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            difficulty: parse_or(&lookup, "POW_DIFFICULTY", defaults.difficulty)?,
            mining_reward: parse_or(&lookup, "MINING_REWARD", defaults.mining_reward)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        }),
        None => Ok(default),
    }
}
