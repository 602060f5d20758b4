//! End-to-end test suite for Tally.
//!
//! Integration tests drive the [`Ledger`](tally_node_lib::Ledger) with raw
//! blocks built by [`helpers`], over both the in-memory and RocksDB stores.

pub mod helpers;
