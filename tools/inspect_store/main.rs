//! Inspect a language's persistent word store
//!
//! Usage:
//!   cargo run -p inspect_store -- --language English --prefix th
//!   cargo run -p inspect_store -- --db data/languages/English.redb --limit 20 --json

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use quicktype_core::{PersistentStore, DEFAULT_FREQUENCY_THRESHOLD};

#[derive(Parser, Debug)]
#[command(name = "inspect_store")]
#[command(about = "Print row counts and top words of a language store")]
struct Args {
    /// Path to the store file (overrides --data-dir/--language)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Service data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Language name
    #[arg(short, long, default_value = "English")]
    language: String,

    /// Only show words starting with this prefix
    #[arg(short, long, default_value = "")]
    prefix: String,

    /// Maximum rows to print
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Frequency threshold used to report the hot-tier size
    #[arg(long, default_value_t = DEFAULT_FREQUENCY_THRESHOLD)]
    threshold: u64,

    /// Print rows as JSON
    #[arg(long)]
    json: bool,
}

fn store_path(args: &Args) -> PathBuf {
    if let Some(db) = &args.db {
        return db.clone();
    }
    let data_dir = args.data_dir.clone().unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("quicktype")
    });
    PersistentStore::path_for(&data_dir, &args.language)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let path = store_path(&args);
    if !path.exists() {
        anyhow::bail!("no store at {}", path.display());
    }

    let store = PersistentStore::open(&path)
        .with_context(|| format!("failed to open store {}", path.display()))?;
    let total = store.len()?;
    let hot = store.rows_above(args.threshold)?.len();
    let rows = store.query_by_prefix(&[args.prefix.clone()], &HashSet::new(), None, args.limit)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("Opened store: {}", path.display());
    println!("  rows: {total}");
    println!("  above threshold {}: {hot}", args.threshold);
    for (i, word) in rows.iter().enumerate() {
        println!("  [{}] {} {}", i + 1, word.text, word.frequency);
    }
    Ok(())
}
