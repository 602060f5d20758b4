//! RocksDB-backed persistent store.
//!
//! Implements [`KvStore`] with one column family per [`Column`]. A
//! [`tally_core::store::WriteBatch`] is translated into a single
//! [`rocksdb::WriteBatch`] so each block commits atomically.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteOptions, DB};

use tally_core::error::StoreError;
use tally_core::store::{BatchOp, Column, KvStore, WriteBatch};

/// RocksDB-backed store.
pub struct RocksStore {
    db: DB,
    sync_writes: bool,
}

impl RocksStore {
    /// Open or create a database at `path` with synced writes.
    ///
    /// Creates all column families if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path, true)
    }

    /// Open or create a database, choosing whether commits sync the WAL.
    pub fn open_with(path: impl AsRef<Path>, sync_writes: bool) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = Column::ALL
            .iter()
            .map(|column| ColumnFamilyDescriptor::new(column.name(), Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::info!(path = %path.as_ref().display(), sync_writes, "opened store");
        Ok(Self { db, sync_writes })
    }

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Trigger manual compaction across all column families.
    pub fn compact(&self) -> Result<(), StoreError> {
        for column in Column::ALL {
            let cf = self.cf_handle(column)?;
            self.db.compact_range_cf(cf, None::<&[u8]>, None::<&[u8]>);
        }
        Ok(())
    }

    fn cf_handle(&self, column: Column) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(column.name())
            .ok_or_else(|| StoreError::Backend(format!("missing column family: {}", column.name())))
    }
}

impl KvStore for RocksStore {
    fn get(&self, column: Column, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self.cf_handle(column)?;
        self.db
            .get_cf(cf, key)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut rocks_batch = rocksdb::WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { column, key, value } => {
                    rocks_batch.put_cf(self.cf_handle(column)?, key, value);
                }
                BatchOp::Delete { column, key } => {
                    rocks_batch.delete_cf(self.cf_handle(column)?, key);
                }
            }
        }

        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        self.db
            .write_opt(rocks_batch, &opts)
            .map_err(|e| StoreError::WriteFailed(e.to_string()))
    }

    fn iter_column(&self, column: Column) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let cf = self.cf_handle(column)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            rows.push((key.into_vec(), value.into_vec()));
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, RocksStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_all_column_families() {
        let (_dir, store) = temp_store();
        for column in Column::ALL {
            assert!(store.cf_handle(column).is_ok(), "missing {}", column.name());
        }
    }

    #[test]
    fn empty_get_is_none() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get(Column::Headers, b"nope").unwrap(), None);
        assert!(store.iter_column(Column::Coins).unwrap().is_empty());
    }

    #[test]
    fn batch_put_and_delete() {
        let (_dir, store) = temp_store();
        let mut batch = WriteBatch::new();
        batch.put(Column::Transactions, b"tx", b"raw");
        batch.put(Column::Coins, b"tx", b"coins");
        store.write(batch).unwrap();

        assert_eq!(store.get(Column::Transactions, b"tx").unwrap(), Some(b"raw".to_vec()));
        assert_eq!(store.get(Column::Coins, b"tx").unwrap(), Some(b"coins".to_vec()));

        let mut batch = WriteBatch::new();
        batch.delete(Column::Coins, b"tx");
        store.write(batch).unwrap();
        assert_eq!(store.get(Column::Coins, b"tx").unwrap(), None);
        assert!(store.contains(Column::Transactions, b"tx").unwrap());
    }

    #[test]
    fn iter_column_in_key_order() {
        let (_dir, store) = temp_store();
        let mut batch = WriteBatch::new();
        batch.put(Column::Spends, [2u8], b"b");
        batch.put(Column::Spends, [1u8], b"a");
        batch.put(Column::Headers, [0u8], b"other column");
        store.write(batch).unwrap();

        let rows = store.iter_column(Column::Spends).unwrap();
        assert_eq!(rows, vec![(vec![1u8], b"a".to_vec()), (vec![2u8], b"b".to_vec())]);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RocksStore::open_with(dir.path(), false).unwrap();
            let mut batch = WriteBatch::new();
            batch.put(Column::Metadata, b"k", b"v");
            store.write(batch).unwrap();
            store.flush().unwrap();
            store.compact().unwrap();
        }
        let store = RocksStore::open(dir.path()).unwrap();
        assert_eq!(store.get(Column::Metadata, b"k").unwrap(), Some(b"v".to_vec()));
    }
}
