//! Single-writer ledger over a [`KvStore`].
//!
//! [`Ledger`] owns the in-memory UTXO index behind a `parking_lot::RwLock`.
//! `add_block` holds the write guard from parsing through commit to index
//! update, so blocks are committed in the same order they mutate the index.
//! Lookups take the read guard and never observe a half-applied block.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use tally_core::codec::decode_from_slice;
use tally_core::coins::{Coins, TxOut};
use tally_core::error::{StoreError, TallyError};
use tally_core::ingest::{ingest_block, IngestStats};
use tally_core::store::{Column, KvStore};
use tally_core::types::{Hash256, OutPoint};
use tally_core::utxo::UtxoIndex;

use crate::error::NodeError;

// --- Metadata keys ---

const META_TIP_HASH: &[u8] = b"tip_hash";
const META_BLOCK_COUNT: &[u8] = b"block_count";

/// Result of one successful `add_block`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub hash: Hash256,
    /// Blocks ingested so far, this one included.
    pub block_count: u64,
    pub stats: IngestStats,
}

/// Snapshot of ledger totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    /// Transactions with at least one unspent output.
    pub utxo_entries: usize,
    pub live_outputs: usize,
    pub total_value: i64,
    pub tip: Option<Hash256>,
    pub block_count: u64,
}

struct LedgerState {
    utxo: UtxoIndex,
    tip: Option<Hash256>,
    block_count: u64,
}

/// Block ingestion and output lookups over a persistent store.
pub struct Ledger<S> {
    store: Arc<S>,
    state: RwLock<LedgerState>,
}

impl<S: KvStore> Ledger<S> {
    /// Open a ledger, rebuilding the UTXO index from the store's coins rows.
    pub fn open(store: Arc<S>) -> Result<Self, TallyError> {
        let utxo = UtxoIndex::from_rows(store.iter_column(Column::Coins)?)?;

        let tip = store
            .get(Column::Metadata, META_TIP_HASH)?
            .map(|bytes| {
                Hash256::from_slice(&bytes)
                    .ok_or_else(|| StoreError::Corrupt(format!("tip hash of {} bytes", bytes.len())))
            })
            .transpose()?;

        let block_count = match store.get(Column::Metadata, META_BLOCK_COUNT)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Corrupt(format!("block count of {} bytes", bytes.len()))
                })?;
                u64::from_le_bytes(raw)
            }
            None => 0,
        };

        info!(utxo_entries = utxo.len(), block_count, "ledger opened");
        Ok(Self {
            store,
            state: RwLock::new(LedgerState { utxo, tip, block_count }),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Ingest one raw block and commit it atomically.
    ///
    /// On any error nothing is written and the UTXO index is unchanged.
    pub fn add_block(&self, raw: &[u8]) -> Result<BlockSummary, TallyError> {
        let mut state = self.state.write();

        let mut block = ingest_block(raw, &state.utxo)?;
        let hash = block.block_hash();
        let block_count = state.block_count + 1;
        block.batch.put(Column::Metadata, META_TIP_HASH, hash.as_bytes());
        block.batch.put(Column::Metadata, META_BLOCK_COUNT, block_count.to_le_bytes());

        if let Err(e) = self.store.write(block.batch) {
            warn!(block = %hash, error = %e, "block commit failed");
            return Err(e.into());
        }

        state.utxo.apply(block.changes);
        state.tip = Some(hash);
        state.block_count = block_count;

        debug!(
            block = %hash,
            txs = block.stats.tx_count,
            spent = block.stats.inputs_spent,
            created = block.stats.outputs_created,
            missing = block.stats.missing_spends,
            "block committed"
        );
        Ok(BlockSummary { hash, block_count, stats: block.stats })
    }

    /// Resolve each outpoint to its unspent output, preserving order.
    ///
    /// Unknown transactions and spent or out-of-range positions give `None`.
    pub fn get_outputs_by_inputs(
        &self,
        inputs: &[OutPoint],
    ) -> Result<Vec<Option<TxOut>>, TallyError> {
        let state = self.state.read();
        inputs
            .iter()
            .map(|input| {
                let coins = state.utxo.get(&input.txid)?;
                Ok::<_, TallyError>(coins.available(input.index as usize).cloned())
            })
            .collect()
    }

    /// Like [`get_outputs_by_inputs`](Self::get_outputs_by_inputs) for raw
    /// 36-byte input references (hash followed by LE output index).
    ///
    /// A reference of any other length is a codec error.
    pub fn get_outputs_by_input_keys(
        &self,
        keys: &[&[u8]],
    ) -> Result<Vec<Option<TxOut>>, TallyError> {
        let inputs = keys
            .iter()
            .map(|key| decode_from_slice::<OutPoint>(key))
            .collect::<Result<Vec<_>, _>>()?;
        self.get_outputs_by_inputs(&inputs)
    }

    /// Current output set of `txid`; empty if unknown or fully spent.
    pub fn get_coins(&self, txid: &Hash256) -> Result<Coins, TallyError> {
        Ok(self.state.read().utxo.get(txid)?)
    }

    /// Raw bytes of a stored transaction.
    pub fn get_transaction(&self, txid: &Hash256) -> Result<Option<Vec<u8>>, TallyError> {
        Ok(self.store.get(Column::Transactions, txid.as_bytes())?)
    }

    /// 80-byte header of a stored block.
    pub fn get_header(&self, block_hash: &Hash256) -> Result<Option<Vec<u8>>, TallyError> {
        Ok(self.store.get(Column::Headers, block_hash.as_bytes())?)
    }

    /// Hash of the transaction that spent `outpoint`, if recorded.
    pub fn get_spender(&self, outpoint: &OutPoint) -> Result<Option<Hash256>, TallyError> {
        let Some(bytes) = self.store.get(Column::Spends, &outpoint.to_key())? else {
            return Ok(None);
        };
        let txid = Hash256::from_slice(&bytes).ok_or_else(|| {
            StoreError::Corrupt(format!("spender of {outpoint} is {} bytes", bytes.len()))
        })?;
        Ok(Some(txid))
    }

    pub fn tip(&self) -> Option<Hash256> {
        self.state.read().tip
    }

    pub fn block_count(&self) -> u64 {
        self.state.read().block_count
    }

    pub fn stats(&self) -> Result<LedgerStats, TallyError> {
        let state = self.state.read();
        let mut live_outputs = 0;
        let mut total_value = 0i64;
        for (hash, _) in state.utxo.iter_raw() {
            let coins = state.utxo.get(hash)?;
            live_outputs += coins.available_count();
            total_value = total_value.saturating_add(coins.total_value());
        }
        Ok(LedgerStats {
            utxo_entries: state.utxo.len(),
            live_outputs,
            total_value,
            tip: state.tip,
            block_count: state.block_count,
        })
    }
}

impl<S: KvStore + 'static> Ledger<S> {
    /// Run [`add_block`](Self::add_block) on the blocking thread pool.
    ///
    /// Await each call before starting the next to keep block order.
    pub async fn add_block_async(self: &Arc<Self>, raw: Vec<u8>) -> Result<BlockSummary, NodeError> {
        let ledger = Arc::clone(self);
        let summary = tokio::task::spawn_blocking(move || ledger.add_block(&raw))
            .await
            .map_err(|e| NodeError::Task(e.to_string()))??;
        Ok(summary)
    }
}
