//! Wire-format constants.

/// Size of a serialized block header in bytes.
pub const HEADER_SIZE: usize = 80;

/// Size of a hash value in bytes.
pub const HASH_SIZE: usize = 32;

/// Size of a serialized outpoint (prior tx hash + LE u32 output index).
pub const OUTPOINT_SIZE: usize = HASH_SIZE + 4;

/// Largest value a decoded varint may carry.
///
/// Bounds allocations driven by untrusted length fields.
pub const VARINT_MAX: u64 = 0x0200_0000;

/// Transaction version field size.
pub const TX_VERSION_SIZE: usize = 4;

/// Input sequence number size.
pub const TX_SEQUENCE_SIZE: usize = 4;

/// Transaction lock-time field size.
pub const TX_LOCK_TIME_SIZE: usize = 4;

/// Value stored in a null (absent or spent) output.
pub const NULL_OUTPUT_VALUE: i64 = -1;
