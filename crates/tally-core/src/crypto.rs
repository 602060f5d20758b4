//! Hash primitive.

use sha2::{Digest, Sha256};

use crate::types::Hash256;

/// SHA-256 applied twice, the identifier hash for transactions and headers.
pub fn double_sha256(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    Hash256(Sha256::digest(first).into())
}
