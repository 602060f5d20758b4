//! # tally-node: storage, ledger, and block import.
//!
//! Wires the ingestion engine from `tally-core` to durable storage:
//! - [`storage::RocksStore`]: [`KvStore`](tally_core::store::KvStore) backed by RocksDB
//! - [`ledger::Ledger`]: single-writer block ingestion and output lookups
//! - [`blkfile`]: reader and importer for `blkNNNNN.dat` block files
//! - [`config::NodeConfig`]: node configuration

pub mod blkfile;
pub mod config;
pub mod error;
pub mod ledger;
pub mod storage;

pub use blkfile::{BlockFileReader, Network};
pub use config::NodeConfig;
pub use error::NodeError;
pub use ledger::Ledger;
pub use storage::RocksStore;
