//! Ledger over a real RocksDB store: commit, reopen, and import.

use std::sync::Arc;

use tally_core::store::{Column, KvStore};
use tally_core::types::{Hash256, OutPoint};
use tally_node_lib::blkfile::{discover_block_files, import_files, Network};
use tally_node_lib::{Ledger, RocksStore};
use tally_tests::helpers::*;

/// Chain `blocks` of transactions on top of each other, starting from zero.
fn chain(blocks: Vec<Vec<Vec<u8>>>) -> Vec<Vec<u8>> {
    let mut prev = Hash256::ZERO;
    blocks
        .into_iter()
        .map(|txs| {
            let block = make_block(prev, &txs);
            prev = block_hash(&block);
            block
        })
        .collect()
}

#[test]
fn reopen_rebuilds_utxo_index_from_coins_column() {
    let dir = tempfile::tempdir().unwrap();
    let cb = make_coinbase(1, &[out(50, 1), out(20, 2)]);
    let funding = txid(&cb);
    let spend = make_tx(&[OutPoint::new(funding, 0)], &[out(49, 3)]);
    let spender = txid(&spend);
    let blocks = chain(vec![vec![cb], vec![make_coinbase(2, &[out(50, 4)]), spend]]);

    let tip = {
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let ledger = Ledger::open(store).unwrap();
        ledger.add_block(&blocks[0]).unwrap();
        ledger.add_block(&blocks[1]).unwrap().hash
    };

    let store = Arc::new(RocksStore::open(dir.path()).unwrap());
    let ledger = Ledger::open(Arc::clone(&store)).unwrap();
    assert_eq!(ledger.tip(), Some(tip));
    assert_eq!(ledger.block_count(), 2);

    let found = ledger
        .get_outputs_by_inputs(&[
            OutPoint::new(funding, 0),
            OutPoint::new(funding, 1),
            OutPoint::new(spender, 0),
        ])
        .unwrap();
    assert_eq!(found, vec![None, Some(out(20, 2)), Some(out(49, 3))]);
    assert_eq!(ledger.get_spender(&OutPoint::new(funding, 0)).unwrap(), Some(spender));

    // Coins rows and the in-memory index agree.
    assert_eq!(store.iter_column(Column::Coins).unwrap().len(), ledger.stats().unwrap().utxo_entries);
}

#[test]
fn fully_spent_transaction_leaves_no_coins_row() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RocksStore::open(dir.path()).unwrap());
    let ledger = Ledger::open(Arc::clone(&store)).unwrap();

    let cb = make_coinbase(1, &[out(5, 1)]);
    let funding = txid(&cb);
    let spend = make_tx(&[OutPoint::new(funding, 0)], &[out(5, 2)]);
    let blocks = chain(vec![vec![cb], vec![make_coinbase(2, &[]), spend]]);

    ledger.add_block(&blocks[0]).unwrap();
    assert!(store.contains(Column::Coins, funding.as_bytes()).unwrap());

    ledger.add_block(&blocks[1]).unwrap();
    assert!(!store.contains(Column::Coins, funding.as_bytes()).unwrap());
    assert!(store.contains(Column::Transactions, funding.as_bytes()).unwrap());
}

#[tokio::test]
async fn import_block_files_into_rocks() {
    let blocks_dir = tempfile::tempdir().unwrap();
    let magic = Network::Regtest.magic();

    let cb = make_coinbase(1, &[out(50, 1)]);
    let funding = txid(&cb);
    let spend = make_tx(&[OutPoint::new(funding, 0)], &[out(50, 2)]);
    let blocks = chain(vec![
        vec![cb],
        vec![make_coinbase(2, &[out(50, 3)]), spend],
        vec![make_coinbase(3, &[out(50, 4)])],
    ]);

    // Two blocks in the first file, one in the second. Both carry a
    // preallocated zero tail, the second one not a multiple of four.
    for (name, range, tail) in [("blk00000.dat", 0..2, 32), ("blk00001.dat", 2..3, 13)] {
        let mut data = block_file_records(magic, &blocks[range]);
        data.extend(vec![0u8; tail]);
        std::fs::write(blocks_dir.path().join(name), data).unwrap();
    }

    let db_dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(Ledger::open(Arc::new(RocksStore::open(db_dir.path()).unwrap())).unwrap());
    let files = discover_block_files(blocks_dir.path()).unwrap();
    assert_eq!(files.len(), 2);

    let summary = import_files(&ledger, &files, Network::Regtest, None).await.unwrap();
    assert_eq!(summary.files, 2);
    assert_eq!(summary.blocks, 3);
    assert_eq!(summary.transactions, 4);
    assert_eq!(summary.missing_spends, 0);
    assert_eq!(ledger.block_count(), 3);
    assert_eq!(ledger.tip(), Some(block_hash(&blocks[2])));
    assert!(ledger.get_coins(&funding).unwrap().is_empty());
}

#[tokio::test]
async fn import_respects_limit() {
    let blocks_dir = tempfile::tempdir().unwrap();
    let blocks = chain((1..=4).map(|h| vec![make_coinbase(h, &[out(1, h as u8)])]).collect());
    let path = blocks_dir.path().join("blk00000.dat");
    std::fs::write(&path, block_file_records(Network::Mainnet.magic(), &blocks)).unwrap();

    let db_dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(Ledger::open(Arc::new(RocksStore::open(db_dir.path()).unwrap())).unwrap());
    let summary = import_files(&ledger, &[path], Network::Mainnet, Some(2)).await.unwrap();
    assert_eq!(summary.blocks, 2);
    assert_eq!(ledger.block_count(), 2);
    assert_eq!(ledger.tip(), Some(block_hash(&blocks[1])));
}
