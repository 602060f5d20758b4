//! In-memory UTXO index.
//!
//! [`UtxoIndex`] maps a transaction hash to that transaction's output set,
//! kept in serialized form to stay compact. Absent entries read back as an
//! empty [`Coins`]; saving an empty set removes the entry.
//!
//! Block ingestion never mutates the index directly. It works on a
//! [`UtxoOverlay`] whose [`UtxoChanges`] are applied only after the block's
//! write batch has been committed.

use std::collections::{BTreeMap, HashMap};

use crate::codec::{decode_from_slice, encode_to_vec};
use crate::coins::Coins;
use crate::error::{CodecError, StoreError};
use crate::store::{Column, WriteBatch};
use crate::types::Hash256;

/// Transaction hash → serialized output set.
#[derive(Clone, Debug, Default)]
pub struct UtxoIndex {
    entries: HashMap<Hash256, Vec<u8>>,
}

impl UtxoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an index from persisted `(tx hash, serialized coins)` rows.
    ///
    /// Every row is decoded once so corruption is caught at load time.
    pub fn from_rows<I>(rows: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        let mut entries = HashMap::new();
        for (key, value) in rows {
            let hash = Hash256::from_slice(&key).ok_or_else(|| {
                StoreError::Corrupt(format!("coins key of {} bytes", key.len()))
            })?;
            let coins: Coins = decode_from_slice(&value)
                .map_err(|e| StoreError::Corrupt(format!("coins for {hash}: {e}")))?;
            if !coins.is_empty() {
                entries.insert(hash, value);
            }
        }
        Ok(Self { entries })
    }

    /// Number of transactions with at least one live output.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.entries.contains_key(hash)
    }

    /// Serialized output set for `hash`, if stored.
    pub fn raw(&self, hash: &Hash256) -> Option<&[u8]> {
        self.entries.get(hash).map(Vec::as_slice)
    }

    pub fn iter_raw(&self) -> impl Iterator<Item = (&Hash256, &[u8])> {
        self.entries.iter().map(|(h, v)| (h, v.as_slice()))
    }

    /// Store `coins` under `hash`, or remove the entry if `coins` is empty.
    pub fn save(&mut self, hash: Hash256, coins: &Coins) {
        if coins.is_empty() {
            self.entries.remove(&hash);
        } else {
            self.entries.insert(hash, encode_to_vec(coins));
        }
    }

    /// Output set for `hash`; empty if unknown.
    pub fn get(&self, hash: &Hash256) -> Result<Coins, CodecError> {
        match self.entries.get(hash) {
            Some(bytes) if !bytes.is_empty() => decode_from_slice(bytes),
            _ => Ok(Coins::default()),
        }
    }

    /// Apply committed changes.
    pub fn apply(&mut self, changes: UtxoChanges) {
        for (hash, coins) in changes.entries {
            self.save(hash, &coins);
        }
    }
}

/// Copy-on-write view over a [`UtxoIndex`].
///
/// Reads fall through to the base index until a hash has been saved here.
pub struct UtxoOverlay<'a> {
    base: &'a UtxoIndex,
    changes: BTreeMap<Hash256, Coins>,
}

impl<'a> UtxoOverlay<'a> {
    pub fn new(base: &'a UtxoIndex) -> Self {
        Self { base, changes: BTreeMap::new() }
    }

    pub fn get(&self, hash: &Hash256) -> Result<Coins, CodecError> {
        match self.changes.get(hash) {
            Some(coins) => Ok(coins.clone()),
            None => self.base.get(hash),
        }
    }

    /// Record the new state of `hash`. An empty set records a removal.
    pub fn save(&mut self, hash: Hash256, coins: Coins) {
        self.changes.insert(hash, coins);
    }

    pub fn into_changes(self) -> UtxoChanges {
        UtxoChanges { entries: self.changes }
    }
}

/// Final output-set states produced by one ingestion, ordered by hash.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtxoChanges {
    entries: BTreeMap<Hash256, Coins>,
}

impl UtxoChanges {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, hash: &Hash256) -> Option<&Coins> {
        self.entries.get(hash)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Hash256, &Coins)> {
        self.entries.iter()
    }

    /// Stage these changes into the coins column of `batch`.
    pub fn stage(&self, batch: &mut WriteBatch) {
        for (hash, coins) in &self.entries {
            if coins.is_empty() {
                batch.delete(Column::Coins, hash.as_bytes());
            } else {
                batch.put(Column::Coins, hash.as_bytes(), encode_to_vec(coins));
            }
        }
    }
}
