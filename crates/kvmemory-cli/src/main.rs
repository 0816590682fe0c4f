//! CLI entry point for kvmemory.
//!
//! This binary provides the `kvmemory` command with one subcommand per
//! store operation. Results are printed to stdout as JSON lines.

mod cli;
mod helpers;

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use kvmemory_store::{Entry, EntryFilter, EntryStore, Memory, StoreConfig};
use serde_json::json;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::helpers::{init_tracing, print_entries, print_json};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    load_env(cli.env_file.as_deref())?;
    init_tracing(&cli.log_level);

    let config = StoreConfig::from_env().context("invalid database configuration")?;
    info!(url = %config.redacted_url(), "opening entry store");

    let store = EntryStore::open(&config)
        .await
        .with_context(|| format!("failed to open entry store at {}", config.redacted_url()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Migrate => print_json(&mut out, &json!({ "table": store.table() })),
        Commands::Get { key } => {
            let entry = store
                .get_entry(&key)
                .await
                .with_context(|| format!("failed to get entry {key:?}"))?;
            print_entries(&mut out, [&entry])
        }
        Commands::Set {
            key,
            value,
            name,
            id,
        } => {
            let mut entry = Entry::new(key, name, value);
            entry.id = id;
            let id = store
                .save_entry(entry)
                .await
                .context("failed to save entry")?;
            print_json(&mut out, &json!({ "id": id }))
        }
        Commands::List => {
            let entries = store
                .get_all_entries()
                .await
                .context("failed to list entries")?;
            print_entries(&mut out, &entries)
        }
        Commands::Find { pattern } => {
            let entries = store
                .get_entries_like_name(&pattern)
                .await
                .with_context(|| format!("failed to find entries for {pattern:?}"))?;
            print_entries(&mut out, &entries)
        }
        Commands::Exists { id, key, name } => {
            let filter = EntryFilter {
                id,
                key,
                name,
                ..EntryFilter::default()
            };
            let exists = store
                .is_entry_exists(&filter)
                .await
                .context("failed to check entry existence")?;
            print_json(&mut out, &json!({ "exists": exists }))
        }
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Load `path`, or `./.env` when no path is given.
///
/// Runs before tracing is installed so `RUST_LOG` may come from the file.
/// A missing default file is fine; a missing explicit file is not.
fn load_env(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).context("failed to load .env"),
        },
    }
    Ok(())
}
