//! Node configuration.
//!
//! [`NodeConfig`] starts from built-in defaults, then layers an optional
//! TOML file and `TALLY_*` environment variables on top. Command-line flags
//! are applied last by the binary.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::blkfile::Network;

/// Configuration for a Tally node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Log level filter string (e.g. "info", "debug", "tally_node_lib=trace").
    pub log_level: String,
    /// Log output format: "text" or "json".
    pub log_format: String,
    /// Network whose block-file magic the importer expects.
    pub network: Network,
    /// Sync the write-ahead log on every committed block.
    pub sync_writes: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tally");

        Self {
            data_dir,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            network: Network::Mainnet,
            sync_writes: true,
        }
    }
}

impl NodeConfig {
    /// Load defaults, then `file` (if given and present), then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(config::Environment::with_prefix("TALLY"))
            .build()?
            .try_deserialize()
    }

    /// Path to the RocksDB chain data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("chaindata")
    }
}
