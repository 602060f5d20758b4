//! Tally node binary.
//!
//! Imports bitcoind block files into a RocksDB-backed ledger and answers
//! output lookups against the resulting UTXO index.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tally_core::types::OutPoint;
use tally_node_lib::blkfile::{discover_block_files, import_files, Network};
use tally_node_lib::{Ledger, NodeConfig, RocksStore};
use tracing::info;

/// Tally: block ingestion and UTXO indexing.
#[derive(Parser, Debug)]
#[command(name = "tally-node", version, about = "Block ingestion and UTXO index over RocksDB")]
struct Cli {
    /// Data directory for the chain database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest blkNNNNN.dat files (or directories of them) in order.
    Import(ImportArgs),
    /// Look up unspent outputs by `txid:index`.
    Outputs(OutputsArgs),
    /// Print UTXO index totals and the chain tip.
    Stats,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Network whose magic prefixes each record (default from config)
    #[arg(long)]
    network: Option<Network>,

    /// Stop after this many blocks
    #[arg(long)]
    limit: Option<usize>,

    /// Block files or directories (default: ~/.bitcoin/blocks)
    paths: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct OutputsArgs {
    /// Input references as `txid:index`, txid in storage byte order
    #[arg(required = true)]
    outpoints: Vec<OutPoint>,
}

impl Cli {
    /// Layer command-line flags over the file and environment configuration.
    fn resolve_config(&self) -> Result<NodeConfig> {
        let mut config =
            NodeConfig::load(self.config.as_deref()).context("failed to load configuration")?;
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    init_logging(&config.log_level, &config.log_format);
    info!("Tally node v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data_dir {:?}", config.data_dir))?;
    let store = Arc::new(
        RocksStore::open_with(config.db_path(), config.sync_writes)
            .context("failed to open chain database")?,
    );
    let ledger = Arc::new(Ledger::open(Arc::clone(&store))?);

    match cli.command {
        Command::Import(args) => {
            let network = args.network.unwrap_or(config.network);
            let files = collect_block_files(args.paths)?;
            if files.is_empty() {
                bail!("no block files found");
            }
            info!(network = ?network, files = files.len(), "starting import");
            let summary = import_files(&ledger, &files, network, args.limit).await?;
            store.flush()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Outputs(args) => {
            let outputs = ledger.get_outputs_by_inputs(&args.outpoints)?;
            for (outpoint, output) in args.outpoints.iter().zip(outputs) {
                let line = serde_json::json!({
                    "outpoint": outpoint.to_string(),
                    "output": output,
                });
                println!("{line}");
            }
        }
        Command::Stats => {
            let stats = ledger.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// Expand directories into their block files; keep explicit files as given.
fn collect_block_files(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let paths = if paths.is_empty() {
        let home = dirs::home_dir().context("no home directory; pass block file paths")?;
        vec![home.join(".bitcoin").join("blocks")]
    } else {
        paths
    };

    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(discover_block_files(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    // Logs go to stderr so stdout stays machine-readable.
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
