//! Shared raw-block builders for integration tests.

use std::sync::Arc;

use tally_core::codec::Writer;
use tally_core::coins::TxOut;
use tally_core::constants::HEADER_SIZE;
use tally_core::crypto::double_sha256;
use tally_core::store::MemoryStore;
use tally_core::types::{Hash256, OutPoint};
use tally_node_lib::Ledger;

/// Bitcoin mainnet genesis block, 285 bytes.
pub const GENESIS_BLOCK_HEX: &str = concat!(
    "0100000000000000000000000000000000000000000000000000000000000000",
    "000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa",
    "4b1e5e4a29ab5f49ffff001d1dac2b7c",
    "01",
    "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff",
    "4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72",
    "206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff",
    "0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f",
    "61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000",
);

/// Display form of the genesis block id (byte-reversed hash).
pub const GENESIS_BLOCK_ID: &str =
    "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";

pub fn genesis_block() -> Vec<u8> {
    hex::decode(GENESIS_BLOCK_HEX).unwrap()
}

/// Pay-to-pubkey-hash style script unique to `seed`.
pub fn script(seed: u8) -> Vec<u8> {
    let mut s = vec![0x76, 0xA9, 0x14];
    s.extend_from_slice(&[seed; 20]);
    s.extend_from_slice(&[0x88, 0xAC]);
    s
}

pub fn out(value: i64, seed: u8) -> TxOut {
    TxOut::new(value, script(seed))
}

/// Serialize a version-1 transaction.
pub fn make_tx(inputs: &[OutPoint], outputs: &[TxOut]) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(1).varint(inputs.len() as u64);
    for input in inputs {
        w.put(input).var_bytes(&[0x30; 71]).u32(0xFFFF_FFFF);
    }
    w.varint(outputs.len() as u64);
    for output in outputs {
        w.put(output);
    }
    w.u32(0);
    w.into_inner()
}

/// Coinbase with a height marker in its input script so each txid is unique.
pub fn make_coinbase(height: u32, outputs: &[TxOut]) -> Vec<u8> {
    let mut w = Writer::new();
    w.u32(1).varint(1);
    w.put(&OutPoint::new(Hash256::ZERO, u32::MAX))
        .var_bytes(&height.to_le_bytes())
        .u32(0xFFFF_FFFF);
    w.varint(outputs.len() as u64);
    for output in outputs {
        w.put(output);
    }
    w.u32(0);
    w.into_inner()
}

/// Serialize a block on top of `prev`. The header is never validated.
pub fn make_block(prev: Hash256, txs: &[Vec<u8>]) -> Vec<u8> {
    let merkle_stand_in = txs.first().map(|tx| double_sha256(tx)).unwrap_or_default();
    let mut w = Writer::with_capacity(HEADER_SIZE + txs.iter().map(Vec::len).sum::<usize>() + 9);
    w.u32(1)
        .hash(&prev)
        .hash(&merkle_stand_in)
        .u32(1_231_006_505)
        .u32(0x1D00_FFFF)
        .u32(0);
    w.varint(txs.len() as u64);
    for tx in txs {
        w.bytes(tx);
    }
    w.into_inner()
}

/// Frame blocks as `blkNNNNN.dat` records: magic, LE size, block.
pub fn block_file_records(magic: u32, blocks: &[Vec<u8>]) -> Vec<u8> {
    let mut data = Vec::new();
    for block in blocks {
        data.extend_from_slice(&magic.to_le_bytes());
        data.extend_from_slice(&(block.len() as u32).to_le_bytes());
        data.extend_from_slice(block);
    }
    data
}

pub fn txid(raw_tx: &[u8]) -> Hash256 {
    double_sha256(raw_tx)
}

/// Hash of a raw block's 80-byte header.
pub fn block_hash(raw_block: &[u8]) -> Hash256 {
    double_sha256(&raw_block[..HEADER_SIZE.min(raw_block.len())])
}

/// Byte-reversed hex, the way block explorers print ids.
pub fn display_id(hash: &Hash256) -> String {
    let mut bytes = *hash.as_bytes();
    bytes.reverse();
    hex::encode(bytes)
}

/// A ledger over a fresh in-memory store, plus a handle to the store.
pub fn memory_ledger() -> (Arc<MemoryStore>, Ledger<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::open(Arc::clone(&store)).unwrap();
    (store, ledger)
}
