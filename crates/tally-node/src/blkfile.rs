//! Reader and importer for `blkNNNNN.dat` block files.
//!
//! Each record is `magic (u32 LE) | size (u32 LE) | block (size bytes)`.
//! Files are preallocated, so a run of zero bytes may follow the last
//! record; zero magics are skipped.
//!
//! Blocks are imported in file order. Files written by a headers-first
//! client may store a block before its parent; such blocks are ingested as
//! they come and any spends of not-yet-seen outputs are counted as missing.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use tally_core::codec::StreamParser;
use tally_core::store::KvStore;

use crate::error::ImportError;
use crate::ledger::Ledger;

/// Network whose message-start bytes prefix each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn magic(self) -> u32 {
        match self {
            Network::Mainnet => 0xD9B4_BEF9,
            Network::Testnet => 0x0709_110B,
            Network::Regtest => 0xDAB5_BFFA,
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "regtest" => Ok(Network::Regtest),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// Iterator over the raw blocks of one block file.
///
/// Stops after the first error.
pub struct BlockFileReader<R> {
    parser: StreamParser<R>,
    magic: u32,
    done: bool,
}

impl<R: Read> BlockFileReader<R> {
    pub fn new(reader: R, network: Network) -> Self {
        Self { parser: StreamParser::new(reader), magic: network.magic(), done: false }
    }

    /// Bytes consumed so far.
    pub fn offset(&self) -> usize {
        self.parser.tell()
    }

    fn next_record(&mut self) -> Result<Option<Vec<u8>>, ImportError> {
        // Padding runs have arbitrary length, so skip them a byte at a time.
        let (offset, first) = loop {
            let offset = self.parser.tell();
            match self.parser.try_u8()? {
                None => return Ok(None),
                Some(0) => continue,
                Some(byte) => break (offset, byte),
            }
        };
        let rest: [u8; 3] = self.parser.array()?;
        let found = u32::from_le_bytes([first, rest[0], rest[1], rest[2]]);
        if found != self.magic {
            return Err(ImportError::BadMagic { expected: self.magic, found, offset });
        }
        let size = self.parser.u32()? as usize;
        Ok(Some(self.parser.bytes(size)?))
    }
}

impl BlockFileReader<BufReader<File>> {
    pub fn open(path: &Path, network: Network) -> Result<Self, ImportError> {
        let file = File::open(path).map_err(|source| ImportError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file), network))
    }
}

impl<R: Read> Iterator for BlockFileReader<R> {
    type Item = Result<Vec<u8>, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_record().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

fn is_block_file_name(name: &str) -> bool {
    name.strip_prefix("blk")
        .and_then(|rest| rest.strip_suffix(".dat"))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// `blkNNNNN.dat` files in `dir`, sorted by name.
pub fn discover_block_files(dir: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let io_err = |source: std::io::Error| ImportError::Io { path: dir.display().to_string(), source };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.file_name().to_str().is_some_and(is_block_file_name) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Totals for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub files: usize,
    pub blocks: usize,
    pub transactions: usize,
    pub missing_spends: usize,
}

/// Ingest every block of `files` in order, stopping after `limit` blocks.
pub async fn import_files<S: KvStore + 'static>(
    ledger: &Arc<Ledger<S>>,
    files: &[PathBuf],
    network: Network,
    limit: Option<usize>,
) -> Result<ImportSummary, ImportError> {
    let mut summary = ImportSummary::default();

    for path in files {
        if limit.is_some_and(|limit| summary.blocks >= limit) {
            break;
        }
        info!(path = %path.display(), "importing block file");
        summary.files += 1;

        for (index, record) in BlockFileReader::open(path, network)?.enumerate() {
            if limit.is_some_and(|limit| summary.blocks >= limit) {
                break;
            }
            let block = ledger.add_block_async(record?).await.map_err(|source| {
                ImportError::Ledger { path: path.display().to_string(), index, source }
            })?;
            summary.blocks += 1;
            summary.transactions += block.stats.tx_count;
            summary.missing_spends += block.stats.missing_spends;
            debug!(block = %block.hash, count = block.block_count, "imported");
        }
    }

    info!(
        files = summary.files,
        blocks = summary.blocks,
        transactions = summary.transactions,
        "import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tally_core::error::CodecError;

    fn record(magic: u32, block: &[u8]) -> Vec<u8> {
        let mut out = magic.to_le_bytes().to_vec();
        out.extend_from_slice(&(block.len() as u32).to_le_bytes());
        out.extend_from_slice(block);
        out
    }

    #[test]
    fn magic_values() {
        assert_eq!(Network::Mainnet.magic().to_le_bytes(), [0xF9, 0xBE, 0xB4, 0xD9]);
        assert_eq!(Network::Testnet.magic().to_le_bytes(), [0x0B, 0x11, 0x09, 0x07]);
        assert_eq!(Network::Regtest.magic().to_le_bytes(), [0xFA, 0xBF, 0xB5, 0xDA]);
    }

    #[test]
    fn network_parses_names() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("Testnet".parse::<Network>().unwrap(), Network::Testnet);
        assert!("signet".parse::<Network>().is_err());
    }

    #[test]
    fn reads_consecutive_records_and_skips_padding() {
        let magic = Network::Regtest.magic();
        let mut data = record(magic, b"first");
        data.extend(record(magic, b"second"));
        data.extend([0u8; 16]);

        let blocks: Vec<Vec<u8>> = BlockFileReader::new(Cursor::new(data), Network::Regtest)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(blocks, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn zero_padding_between_records() {
        let magic = Network::Mainnet.magic();
        let mut data = record(magic, b"a");
        data.extend([0u8; 8]);
        data.extend(record(magic, b"b"));
        let reader = BlockFileReader::new(Cursor::new(data), Network::Mainnet);
        assert_eq!(reader.count(), 2);
    }

    #[test]
    fn unaligned_zero_tail_is_clean_end() {
        let magic = Network::Mainnet.magic();
        for tail in [1, 3, 5, 7] {
            let mut data = record(magic, b"block");
            data.extend(vec![0u8; tail]);
            let blocks: Vec<Vec<u8>> = BlockFileReader::new(Cursor::new(data), Network::Mainnet)
                .collect::<Result<_, _>>()
                .unwrap();
            assert_eq!(blocks, vec![b"block".to_vec()], "tail = {tail}");
        }
    }

    #[test]
    fn unaligned_padding_between_records() {
        let magic = Network::Testnet.magic();
        let mut data = record(magic, b"a");
        data.extend([0u8; 5]);
        data.extend(record(magic, b"b"));
        let mut reader = BlockFileReader::new(Cursor::new(data), Network::Testnet);
        assert_eq!(reader.next().unwrap().unwrap(), b"a".to_vec());
        assert_eq!(reader.next().unwrap().unwrap(), b"b".to_vec());
        assert!(reader.next().is_none());
        assert_eq!(reader.offset(), 9 + 5 + 9);
    }

    #[test]
    fn wrong_magic_fails_once() {
        let mut data = record(Network::Mainnet.magic(), b"ok");
        data.extend(record(Network::Testnet.magic(), b"bad"));
        let mut reader = BlockFileReader::new(Cursor::new(data), Network::Mainnet);

        assert_eq!(reader.next().unwrap().unwrap(), b"ok".to_vec());
        match reader.next() {
            Some(Err(ImportError::BadMagic { expected, found, offset })) => {
                assert_eq!(expected, Network::Mainnet.magic());
                assert_eq!(found, Network::Testnet.magic());
                assert_eq!(offset, 10);
            }
            other => panic!("expected BadMagic, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn truncated_record_is_unexpected_eof() {
        let mut data = record(Network::Mainnet.magic(), b"complete block");
        data.truncate(data.len() - 3);
        let mut reader = BlockFileReader::new(Cursor::new(data), Network::Mainnet);
        assert!(matches!(
            reader.next(),
            Some(Err(ImportError::Codec(CodecError::UnexpectedEof { requested: 3, .. })))
        ));
    }

    #[test]
    fn block_file_names() {
        assert!(is_block_file_name("blk00000.dat"));
        assert!(is_block_file_name("blk0001.dat"));
        assert!(!is_block_file_name("rev00000.dat"));
        assert!(!is_block_file_name("blk.dat"));
        assert!(!is_block_file_name("blk0000a.dat"));
    }

    #[test]
    fn discover_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["blk00002.dat", "blk00000.dat", "rev00000.dat", "blk00001.dat"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let files = discover_block_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["blk00000.dat", "blk00001.dat", "blk00002.dat"]);
    }

    #[test]
    fn discover_missing_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_block_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }
}
