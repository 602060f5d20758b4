//! Transaction outputs and per-transaction output sets.
//!
//! A [`Coins`] value holds every output of one transaction, indexed by
//! position. Spent outputs are replaced by the null output (value −1), and
//! trailing nulls are pruned after each spend, so the stored length is
//! always one past the highest live position.

use serde::{Deserialize, Serialize};

use crate::codec::{varint_size, Decode, Encode, Parser, Writer};
use crate::constants::NULL_OUTPUT_VALUE;
use crate::error::CodecError;

/// Smallest possible encoding of a [`TxOut`]: 8-byte value + empty script.
const MIN_TXOUT_SIZE: usize = 9;

/// A single transaction output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    /// Amount in base units. −1 marks a null (absent or spent) output.
    pub value: i64,
    /// Locking script, opaque to this crate.
    #[serde(with = "hex")]
    pub script: Vec<u8>,
}

impl TxOut {
    pub fn new(value: i64, script: impl Into<Vec<u8>>) -> Self {
        Self { value, script: script.into() }
    }

    /// The null output.
    pub fn null() -> Self {
        Self { value: NULL_OUTPUT_VALUE, script: Vec::new() }
    }

    pub fn is_null(&self) -> bool {
        self.value == NULL_OUTPUT_VALUE
    }

    /// Length of the wire encoding.
    pub fn serialized_size(&self) -> usize {
        8 + varint_size(self.script.len() as u64) + self.script.len()
    }
}

impl Default for TxOut {
    fn default() -> Self {
        Self::null()
    }
}

impl Encode for TxOut {
    fn encode(&self, w: &mut Writer) {
        w.i64(self.value).var_bytes(&self.script);
    }
}

impl Decode for TxOut {
    fn decode(p: &mut Parser<'_>) -> Result<Self, CodecError> {
        let value = p.i64()?;
        let script = p.var_bytes()?.to_vec();
        Ok(Self { value, script })
    }
}

/// All outputs of one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Coins {
    outs: Vec<TxOut>,
}

impl Coins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots, including null ones.
    pub fn len(&self) -> usize {
        self.outs.len()
    }

    /// True when there are no slots or every slot is null.
    ///
    /// Note this differs from `len() == 0`: an unpruned set of nulls is empty.
    pub fn is_empty(&self) -> bool {
        self.outs.iter().all(TxOut::is_null)
    }

    /// Grow or shrink to exactly `count` slots, padding with nulls.
    pub fn resize(&mut self, count: usize) {
        self.outs.resize_with(count, TxOut::null);
    }

    /// Overwrite the slot at `pos`, growing the set if needed.
    ///
    /// Outpoint indices are `u32`, so any position read off the wire fits.
    ///
    /// # Panics
    ///
    /// Growing to `pos + 1` slots panics like any `Vec` growth when the
    /// capacity overflows or cannot be allocated.
    pub fn set(&mut self, pos: usize, out: TxOut) {
        if pos < self.outs.len() {
            self.outs[pos] = out;
        } else {
            self.resize(pos);
            self.outs.push(out);
        }
    }

    /// Mark the output at `pos` as spent.
    ///
    /// Returns false, leaving the set untouched, if `pos` is out of range or
    /// already null. Otherwise nulls the slot and prunes trailing nulls.
    pub fn spend(&mut self, pos: usize) -> bool {
        match self.outs.get_mut(pos) {
            Some(out) if !out.is_null() => {
                *out = TxOut::null();
                self.prune();
                true
            }
            _ => false,
        }
    }

    /// The output at `pos`, or the null output if absent or spent.
    pub fn get(&self, pos: usize) -> TxOut {
        self.available(pos).cloned().unwrap_or_default()
    }

    /// Borrow the output at `pos` if it is live.
    pub fn available(&self, pos: usize) -> Option<&TxOut> {
        self.outs.get(pos).filter(|out| !out.is_null())
    }

    pub fn is_available(&self, pos: usize) -> bool {
        self.available(pos).is_some()
    }

    /// Iterate over all slots, null ones included.
    pub fn iter(&self) -> impl Iterator<Item = &TxOut> {
        self.outs.iter()
    }

    /// Number of live outputs.
    pub fn available_count(&self) -> usize {
        self.outs.iter().filter(|out| !out.is_null()).count()
    }

    /// Sum of live output values, saturating at the i64 bounds.
    pub fn total_value(&self) -> i64 {
        self.outs
            .iter()
            .filter(|out| !out.is_null())
            .fold(0i64, |acc, out| acc.saturating_add(out.value))
    }

    fn prune(&mut self) {
        while self.outs.last().is_some_and(TxOut::is_null) {
            self.outs.pop();
        }
    }
}

impl From<Vec<TxOut>> for Coins {
    fn from(outs: Vec<TxOut>) -> Self {
        Self { outs }
    }
}

impl Encode for Coins {
    fn encode(&self, w: &mut Writer) {
        w.varint(self.outs.len() as u64);
        for out in &self.outs {
            out.encode(w);
        }
    }
}

impl Decode for Coins {
    fn decode(p: &mut Parser<'_>) -> Result<Self, CodecError> {
        let count = p.varint_len()?;
        let mut outs = Vec::with_capacity(count.min(p.remaining() / MIN_TXOUT_SIZE));
        for _ in 0..count {
            outs.push(TxOut::decode(p)?);
        }
        Ok(Self { outs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_from_slice, encode_to_vec};
    use proptest::prelude::*;

    fn out(value: i64) -> TxOut {
        TxOut::new(value, vec![0x76, 0xA9, value as u8])
    }

    fn coins(values: &[i64]) -> Coins {
        values.iter().map(|&v| if v < 0 { TxOut::null() } else { out(v) }).collect::<Vec<_>>().into()
    }

    // --- TxOut ---

    #[test]
    fn default_txout_is_null() {
        let o = TxOut::default();
        assert_eq!(o.value, -1);
        assert!(o.script.is_empty());
        assert!(o.is_null());
    }

    #[test]
    fn zero_and_negative_values_are_live() {
        assert!(!TxOut::new(0, vec![]).is_null());
        assert!(!TxOut::new(-2, vec![]).is_null());
    }

    #[test]
    fn txout_wire_layout() {
        let o = TxOut::new(50_0000_0000, vec![0xAC]);
        let bytes = encode_to_vec(&o);
        assert_eq!(&bytes[..8], &50_0000_0000i64.to_le_bytes());
        assert_eq!(&bytes[8..], &[0x01, 0xAC]);
        assert_eq!(bytes.len(), o.serialized_size());
        assert_eq!(decode_from_slice::<TxOut>(&bytes).unwrap(), o);
    }

    // --- set / get ---

    #[test]
    fn set_grows_with_null_gap() {
        let mut c = Coins::new();
        c.set(2, out(5));
        assert_eq!(c.len(), 3);
        assert!(!c.is_available(0));
        assert!(!c.is_available(1));
        assert!(c.is_available(2));
        assert!(!c.is_empty());
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut c = coins(&[1, 2]);
        c.set(0, out(9));
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(0).value, 9);
    }

    #[test]
    fn set_at_len_appends() {
        let mut c = coins(&[1, 2]);
        c.set(2, out(3));
        assert_eq!(c, coins(&[1, 2, 3]));
    }

    #[test]
    fn set_far_position_pads_with_nulls() {
        let mut c = Coins::new();
        let pos = 1000;
        c.set(pos, out(7));
        assert_eq!(c.len(), pos + 1);
        assert_eq!(c.available_count(), 1);
        assert_eq!(c.get(pos), out(7));
    }

    #[test]
    #[should_panic]
    fn set_at_usize_max_panics_without_wrapping() {
        let mut c = coins(&[1]);
        c.set(usize::MAX, out(2));
    }

    #[test]
    fn get_out_of_range_is_null() {
        let c = coins(&[1]);
        assert!(c.get(1).is_null());
        assert!(c.get(100).is_null());
        assert_eq!(c.get(0), out(1));
    }

    // --- spend ---

    #[test]
    fn spend_live_output_prunes_trailing_nulls() {
        let mut c = coins(&[1, -1, 3]);
        assert!(c.spend(2));
        assert_eq!(c.len(), 1);
        assert!(c.is_available(0));
    }

    #[test]
    fn spend_middle_keeps_length() {
        let mut c = coins(&[1, 2, 3]);
        assert!(c.spend(1));
        assert_eq!(c.len(), 3);
        assert!(!c.is_available(1));
        assert!(c.is_available(2));
    }

    #[test]
    fn spend_out_of_range_fails_without_change() {
        let mut c = coins(&[1, 2]);
        let before = c.clone();
        assert!(!c.spend(2));
        assert!(!c.spend(usize::MAX));
        assert_eq!(c, before);
    }

    #[test]
    fn spend_already_null_fails_without_change() {
        let mut c = coins(&[-1, 2]);
        let before = c.clone();
        assert!(!c.spend(0));
        assert_eq!(c, before);
    }

    #[test]
    fn spend_last_live_output_empties_set() {
        let mut c = coins(&[4]);
        assert!(c.spend(0));
        assert_eq!(c.len(), 0);
        assert!(c.is_empty());
    }

    #[test]
    fn set_does_not_prune() {
        let mut c = coins(&[1, 2]);
        c.set(1, TxOut::null());
        assert_eq!(c.len(), 2);
    }

    // --- emptiness and totals ---

    #[test]
    fn all_null_set_is_empty() {
        assert!(Coins::new().is_empty());
        assert!(coins(&[-1, -1]).is_empty());
        assert!(!coins(&[-1, 0]).is_empty());
    }

    #[test]
    fn totals_skip_nulls() {
        let c = coins(&[10, -1, 32]);
        assert_eq!(c.available_count(), 2);
        assert_eq!(c.total_value(), 42);
    }

    // --- wire form ---

    #[test]
    fn coins_wire_layout() {
        let c = coins(&[7, -1]);
        let bytes = encode_to_vec(&c);
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes.len(), 1 + out(7).serialized_size() + TxOut::null().serialized_size());
        assert_eq!(decode_from_slice::<Coins>(&bytes).unwrap(), c);
    }

    #[test]
    fn coins_decode_huge_count_fails_cleanly() {
        // Claims 2^25 outputs but carries none.
        let bytes = [0xFE, 0x00, 0x00, 0x00, 0x02];
        assert!(matches!(
            decode_from_slice::<Coins>(&bytes),
            Err(CodecError::OutOfBounds { .. })
        ));
    }

    proptest! {
        #[test]
        fn spend_keeps_pruned_invariant(
            values in proptest::collection::vec(-1i64..100, 0..16),
            spends in proptest::collection::vec(0usize..20, 0..24),
        ) {
            let mut c = coins(&values);
            for pos in spends {
                let was_available = c.is_available(pos);
                let before = c.clone();
                let spent = c.spend(pos);
                prop_assert_eq!(spent, was_available);
                if spent {
                    prop_assert!(!c.is_available(pos));
                    // After a spend the last slot, if any, is live.
                    prop_assert!(c.iter().last().is_none_or(|o| !o.is_null()));
                } else {
                    prop_assert_eq!(&c, &before);
                }
            }
        }
    }
}
