//! Errors raised by the node layer.

use thiserror::Error;

use tally_core::error::{CodecError, TallyError};

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)] Tally(#[from] TallyError),
    #[error("configuration: {0}")] Config(#[from] config::ConfigError),
    #[error("background task failed: {0}")] Task(String),
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("io error on {path}: {source}")] Io { path: String, source: std::io::Error },
    #[error("bad magic at offset {offset}: expected {expected:#010x}, found {found:#010x}")] BadMagic { expected: u32, found: u32, offset: usize },
    #[error("malformed block record: {0}")] Codec(#[from] CodecError),
    #[error("block {index} of {path}: {source}")] Ledger { path: String, index: usize, source: NodeError },
}
