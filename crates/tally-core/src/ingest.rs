//! Block ingestion engine.
//!
//! [`ingest_block`] walks a raw block once. For every transaction it spends
//! the referenced outputs, collects the new outputs, hashes the exact
//! transaction bytes, and stages the records into a [`WriteBatch`]:
//!
//! | Column | Key | Value |
//! |---|---|---|
//! | `Headers` | block hash | 80-byte header |
//! | `Transactions` | tx hash | raw tx bytes |
//! | `Spends` | 36-byte outpoint | spending tx hash |
//! | `Coins` | tx hash | serialized output set (or delete) |
//!
//! UTXO changes go into an overlay, never into the shared index. The caller
//! commits the batch and then applies [`IngestedBlock::changes`]; if the
//! commit fails both are dropped and the index still matches the store.
//!
//! The first transaction of a block is the coinbase: its inputs reference no
//! real output and are skipped without a UTXO lookup. No other validation is
//! performed. Spending an unknown or already-spent output is counted in
//! [`IngestStats::missing_spends`] and otherwise ignored.

use tracing::{debug, trace};

use crate::codec::Parser;
use crate::coins::{Coins, TxOut};
use crate::constants::{
    HEADER_SIZE, OUTPOINT_SIZE, TX_LOCK_TIME_SIZE, TX_SEQUENCE_SIZE, TX_VERSION_SIZE,
};
use crate::crypto::double_sha256;
use crate::error::{CodecError, IngestError};
use crate::store::{Column, WriteBatch};
use crate::types::{Hash256, OutPoint};
use crate::utxo::{UtxoChanges, UtxoIndex, UtxoOverlay};

/// Smallest transaction: version, empty input and output counts, lock time.
const MIN_TX_SIZE: usize = TX_VERSION_SIZE + 1 + 1 + TX_LOCK_TIME_SIZE;

/// Smallest input: outpoint, empty script, sequence.
const MIN_TXIN_SIZE: usize = OUTPOINT_SIZE + 1 + TX_SEQUENCE_SIZE;

/// Smallest output: 8-byte value and empty script.
const MIN_TXOUT_SIZE: usize = 9;

/// Counters reported for each ingested block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub tx_count: usize,
    /// Inputs that consumed a live output.
    pub inputs_spent: usize,
    pub outputs_created: usize,
    /// Non-coinbase inputs whose referenced output was unknown or already spent.
    pub missing_spends: usize,
}

/// Everything one ingestion produced, ready to commit.
#[derive(Debug)]
pub struct IngestedBlock {
    /// Transaction hashes in block order, followed by the block hash.
    hashes: Vec<Hash256>,
    /// Records to write atomically.
    pub batch: WriteBatch,
    /// UTXO index updates to apply once `batch` is durable.
    pub changes: UtxoChanges,
    pub stats: IngestStats,
}

impl IngestedBlock {
    /// Double SHA-256 of the 80-byte header.
    pub fn block_hash(&self) -> Hash256 {
        // Always present: the block hash is pushed last, even for zero transactions.
        self.hashes[self.hashes.len() - 1]
    }

    /// Transaction hashes in block order.
    pub fn tx_hashes(&self) -> &[Hash256] {
        &self.hashes[..self.hashes.len() - 1]
    }
}

fn tx_error(tx_index: usize) -> impl Fn(CodecError) -> IngestError {
    move |source| IngestError::Transaction { tx_index, source }
}

fn header_error(source: CodecError) -> IngestError {
    IngestError::Header { source }
}

/// Parse `raw` and stage its records against a read-only view of `utxo`.
pub fn ingest_block(raw: &[u8], utxo: &UtxoIndex) -> Result<IngestedBlock, IngestError> {
    let mut p = Parser::new(raw);

    // The header is only hashed and stored, never interpreted.
    p.seek(HEADER_SIZE).map_err(header_error)?;
    let n_tx = p.varint_len().map_err(header_error)?;

    // One slot per transaction plus one for the block hash.
    let mut hashes = Vec::with_capacity(n_tx.min(p.remaining() / MIN_TX_SIZE) + 1);
    let mut overlay = UtxoOverlay::new(utxo);
    let mut batch = WriteBatch::new();
    let mut stats = IngestStats::default();

    for tx_index in 0..n_tx {
        let txid = ingest_transaction(&mut p, tx_index, &mut overlay, &mut batch, &mut stats)?;
        hashes.push(txid);
    }
    stats.tx_count = n_tx;

    if !p.is_empty() {
        debug!(trailing = p.remaining(), "ignoring bytes after last transaction");
    }

    let header = p.span(0, HEADER_SIZE).map_err(header_error)?;
    let block_hash = double_sha256(header);
    batch.put(Column::Headers, block_hash.as_bytes(), header);
    hashes.push(block_hash);

    let changes = overlay.into_changes();
    changes.stage(&mut batch);

    trace!(
        block = %block_hash,
        txs = stats.tx_count,
        spent = stats.inputs_spent,
        created = stats.outputs_created,
        staged = batch.len(),
        "block parsed"
    );

    Ok(IngestedBlock { hashes, batch, changes, stats })
}

/// Parse one transaction at the cursor, returning its hash.
fn ingest_transaction(
    p: &mut Parser<'_>,
    tx_index: usize,
    overlay: &mut UtxoOverlay<'_>,
    batch: &mut WriteBatch,
    stats: &mut IngestStats,
) -> Result<Hash256, IngestError> {
    let err = tx_error(tx_index);
    let start = p.tell();

    p.seek(TX_VERSION_SIZE).map_err(&err)?;

    let n_in = p.varint_len().map_err(&err)?;
    // Spend-index keys wait here until this transaction's hash is known.
    let mut spent_refs: Vec<&[u8]> = Vec::with_capacity(n_in.min(p.remaining() / MIN_TXIN_SIZE));
    for _ in 0..n_in {
        if tx_index == 0 {
            p.seek(OUTPOINT_SIZE).map_err(&err)?;
        } else {
            let ref_start = p.tell();
            let outpoint: OutPoint = p.decode().map_err(&err)?;
            spent_refs.push(p.span(ref_start, p.tell()).map_err(&err)?);
            spend(overlay, &outpoint, stats)?;
        }
        let script_len = p.varint_len().map_err(&err)?;
        p.seek(script_len + TX_SEQUENCE_SIZE).map_err(&err)?;
    }

    let n_out = p.varint_len().map_err(&err)?;
    let mut outs = Vec::with_capacity(n_out.min(p.remaining() / MIN_TXOUT_SIZE));
    for _ in 0..n_out {
        outs.push(p.decode::<TxOut>().map_err(&err)?);
    }

    p.seek(TX_LOCK_TIME_SIZE).map_err(&err)?;

    let raw_tx = p.span(start, p.tell()).map_err(&err)?;
    let txid = double_sha256(raw_tx);

    for key in spent_refs {
        batch.put(Column::Spends, key, txid.as_bytes());
    }
    batch.put(Column::Transactions, txid.as_bytes(), raw_tx);

    stats.outputs_created += outs.len();
    overlay.save(txid, Coins::from(outs));

    Ok(txid)
}

fn spend(
    overlay: &mut UtxoOverlay<'_>,
    outpoint: &OutPoint,
    stats: &mut IngestStats,
) -> Result<(), IngestError> {
    let mut coins = overlay.get(&outpoint.txid).map_err(|source| IngestError::CorruptCoins {
        txid: outpoint.txid.to_string(),
        source,
    })?;
    if coins.spend(outpoint.index as usize) {
        overlay.save(outpoint.txid, coins);
        stats.inputs_spent += 1;
    } else {
        debug!(%outpoint, "input references an unknown or spent output");
        stats.missing_spends += 1;
    }
    Ok(())
}
