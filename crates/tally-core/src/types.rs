//! Identifier types: 32-byte hashes and outpoints.
//!
//! Hashes are kept in wire byte order. `Display` and [`Hash256::from_hex`]
//! use that same order, so hex strings round-trip with what is stored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::{Decode, Encode, Parser, Writer};
use crate::constants::{HASH_SIZE, OUTPOINT_SIZE};
use crate::error::CodecError;

/// A 32-byte hash value (transaction id or block id).
///
/// No value is reserved: the all-zero hash is a valid key like any other.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct Hash256(#[serde(with = "hex")] pub [u8; 32]);

impl Hash256 {
    /// 32 zero bytes.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build a hash from a slice that must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse 64 hex characters in storage byte order.
    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let mut out = [0u8; HASH_SIZE];
        hex::decode_to_slice(s, &mut out).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Hash256 {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Encode for Hash256 {
    fn encode(&self, w: &mut Writer) {
        w.hash(self);
    }
}

impl Decode for Hash256 {
    fn decode(p: &mut Parser<'_>) -> Result<Self, CodecError> {
        p.hash()
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// Transaction containing the referenced output.
    pub txid: Hash256,
    /// Position of the output within that transaction.
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u32) -> Self {
        Self { txid, index }
    }

    /// The 36-byte wire form, used as the spend-index key.
    pub fn to_key(&self) -> [u8; OUTPOINT_SIZE] {
        let mut key = [0u8; OUTPOINT_SIZE];
        key[..HASH_SIZE].copy_from_slice(self.txid.as_bytes());
        key[HASH_SIZE..].copy_from_slice(&self.index.to_le_bytes());
        key
    }

    /// Inverse of [`to_key`](Self::to_key). `None` unless exactly 36 bytes.
    pub fn from_key(key: &[u8]) -> Option<Self> {
        if key.len() != OUTPOINT_SIZE {
            return None;
        }
        let txid = Hash256::from_slice(&key[..HASH_SIZE])?;
        let index = u32::from_le_bytes(key[HASH_SIZE..].try_into().ok()?);
        Some(Self { txid, index })
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

impl FromStr for OutPoint {
    type Err = CodecError;

    /// Parse `txid:index`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, index) = s
            .split_once(':')
            .ok_or_else(|| CodecError::InvalidHex(format!("missing ':' in outpoint {s:?}")))?;
        let index = index
            .parse::<u32>()
            .map_err(|e| CodecError::InvalidHex(format!("bad output index {index:?}: {e}")))?;
        Ok(Self { txid: Hash256::from_hex(txid)?, index })
    }
}

impl Encode for OutPoint {
    fn encode(&self, w: &mut Writer) {
        w.hash(&self.txid).u32(self.index);
    }
}

impl Decode for OutPoint {
    fn decode(p: &mut Parser<'_>) -> Result<Self, CodecError> {
        let txid = p.hash()?;
        let index = p.u32()?;
        Ok(Self { txid, index })
    }
}
