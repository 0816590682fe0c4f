//! CLI argument definitions for kvmemory.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// kvmemory -- persistent key-value entries on MySQL or SQLite.
#[derive(Parser, Debug)]
#[command(
    name = "kvmemory",
    version,
    about = "kvmemory -- persistent key-value entry store",
    long_about = "Reads and writes entries in the configured database. Connection \
                  settings come from DB_* environment variables (or a .env file)."
)]
pub struct Cli {
    /// Load environment variables from this file before connecting.
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the entries table and its indexes if missing.
    Migrate,

    /// Print the entry stored under a key.
    Get {
        key: String,
    },

    /// Insert an entry, or replace it when --id is given.
    Set {
        key: String,

        /// Raw value, stored as UTF-8 bytes.
        value: String,

        /// Display name of the entry.
        #[arg(long, short, default_value = "")]
        name: String,

        /// Id of the row to replace.
        #[arg(long)]
        id: Option<u64>,
    },

    /// Print every stored entry.
    List,

    /// Print every entry whose key equals the pattern.
    Find {
        pattern: String,
    },

    /// Check whether an entry matches all given fields.
    Exists {
        #[arg(long)]
        id: Option<u64>,

        #[arg(long)]
        key: Option<String>,

        #[arg(long)]
        name: Option<String>,
    },
}
