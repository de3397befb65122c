//! Node configuration
//!
//! A JSON file whose path comes from the first command line argument or the
//! `SPV_NODE_CONFIG` environment variable. Missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::consensus::NetworkId;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SPV_NODE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkId,
    /// Block store directory; the store is kept in memory when unset
    pub data_dir: Option<PathBuf>,
    /// Log filter used when `RUST_LOG` is not set
    pub log_filter: String,
    /// Blocks the demo node mines before exiting
    pub blocks_to_mine: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkId::UnitTest,
            data_dir: None,
            log_filter: "info".to_string(),
            blocks_to_mine: 20,
        }
    }
}

impl NodeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load from `arg` if given, else from `SPV_NODE_CONFIG`, else defaults
    pub fn resolve(arg: Option<String>) -> Result<Self, ConfigError> {
        match arg.or_else(|| std::env::var(CONFIG_ENV_VAR).ok()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
