//! # tally-core
//! Wire codec, output sets, UTXO index, and block ingestion for Tally.
//!
//! - [`codec`]: varints, little-endian integers, slice and streaming parsers
//! - [`coins`]: [`TxOut`](coins::TxOut) and per-transaction [`Coins`](coins::Coins)
//! - [`utxo`]: the in-memory [`UtxoIndex`](utxo::UtxoIndex) and its overlay
//! - [`store`]: the [`KvStore`](store::KvStore) contract and an in-memory store
//! - [`ingest`]: [`ingest_block`](ingest::ingest_block)

pub mod codec;
pub mod coins;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod ingest;
pub mod store;
pub mod types;
pub mod utxo;
