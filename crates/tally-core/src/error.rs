//! Error types for Tally.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("out of bounds: requested up to {requested}, available {available}")] OutOfBounds { requested: usize, available: usize },
    #[error("varint too large: {0}")] VarIntTooLarge(u64),
    #[error("unexpected end of input at {position} (needed {requested} more bytes)")] UnexpectedEof { position: usize, requested: usize },
    #[error("{0} trailing bytes after value")] TrailingBytes(usize),
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("io: {0}")] Io(String),
}

impl From<std::io::Error> for CodecError {
    fn from(e: std::io::Error) -> Self {
        CodecError::Io(e.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("write failed: {0}")] WriteFailed(String),
    #[error("backend: {0}")] Backend(String),
    #[error("corrupt record: {0}")] Corrupt(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("malformed block header or transaction count: {source}")] Header { source: CodecError },
    #[error("malformed transaction {tx_index}: {source}")] Transaction { tx_index: usize, source: CodecError },
    #[error("corrupt utxo entry for {txid}: {source}")] CorruptCoins { txid: String, source: CodecError },
}

impl IngestError {
    /// The codec failure underneath this error.
    pub fn codec(&self) -> &CodecError {
        match self {
            IngestError::Header { source }
            | IngestError::Transaction { source, .. }
            | IngestError::CorruptCoins { source, .. } => source,
        }
    }
}

#[derive(Error, Debug)]
pub enum TallyError {
    #[error(transparent)] Codec(#[from] CodecError),
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Ingest(#[from] IngestError),
}
