//! Persistent store interface and in-memory implementation.
//!
//! Provides the [`KvStore`] trait consumed by ingestion: point reads,
//! column scans, and an atomic [`WriteBatch`] commit. [`MemoryStore`] is
//! suitable for testing; the node uses RocksDB (tally-node).
//!
//! A [`WriteBatch`] is a plain in-memory list of operations. Nothing in it
//! is visible to readers until [`KvStore::write`] applies the whole batch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::error::StoreError;

/// Keyspaces of the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    /// Block hash → 80-byte header.
    Headers,
    /// Transaction hash → raw transaction bytes.
    Transactions,
    /// 36-byte outpoint → hash of the transaction that spent it.
    Spends,
    /// Transaction hash → serialized output set (UTXO index rows).
    Coins,
    /// Fixed keys → small values such as the last ingested block.
    Metadata,
}

impl Column {
    pub const ALL: [Column; 5] = [
        Column::Headers,
        Column::Transactions,
        Column::Spends,
        Column::Coins,
        Column::Metadata,
    ];

    /// Stable name, used as the RocksDB column family name.
    pub fn name(self) -> &'static str {
        match self {
            Column::Headers => "headers",
            Column::Transactions => "transactions",
            Column::Spends => "spends",
            Column::Coins => "coins",
            Column::Metadata => "metadata",
        }
    }
}

/// One staged mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put { column: Column, key: Vec<u8>, value: Vec<u8> },
    Delete { column: Column, key: Vec<u8> },
}

/// Ordered set of mutations committed together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, column: Column, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        self.ops.push(BatchOp::Put {
            column,
            key: key.as_ref().to_vec(),
            value: value.as_ref().to_vec(),
        });
    }

    pub fn delete(&mut self, column: Column, key: impl AsRef<[u8]>) {
        self.ops.push(BatchOp::Delete { column, key: key.as_ref().to_vec() });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn extend(&mut self, other: WriteBatch) {
        self.ops.extend(other.ops);
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Ordered byte-keyed store with atomic batched writes.
pub trait KvStore: Send + Sync {
    /// Point lookup. `Ok(None)` if the key is absent.
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Apply every operation in `batch`, or none of them.
    ///
    /// Durable once this returns `Ok`.
    fn write(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// All rows of a column in key order.
    fn iter_column(&self, column: Column) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    /// Whether `key` is present.
    ///
    /// Default implementation delegates to [`get`](Self::get).
    fn contains(&self, column: Column, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(column, key)?.is_some())
    }
}

/// In-memory store for tests and tooling.
///
/// Each write takes the write lock once, so a batch is applied atomically
/// with respect to readers. `fail_writes(true)` makes every subsequent
/// write fail before touching any data.
#[derive(Default)]
pub struct MemoryStore {
    columns: RwLock<BTreeMap<Column, BTreeMap<Vec<u8>, Vec<u8>>>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle deterministic write failures.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of rows in `column`.
    pub fn row_count(&self, column: Column) -> usize {
        self.columns.read().get(&column).map_or(0, BTreeMap::len)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .columns
            .read()
            .get(&column)
            .and_then(|rows| rows.get(key))
            .cloned())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("injected write failure".into()));
        }
        let mut columns = self.columns.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { column, key, value } => {
                    columns.entry(column).or_default().insert(key, value);
                }
                BatchOp::Delete { column, key } => {
                    if let Some(rows) = columns.get_mut(&column) {
                        rows.remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn iter_column(&self, column: Column) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(self
            .columns
            .read()
            .get(&column)
            .map(|rows| rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}
