//! Shared helper functions used across CLI subcommands.
//!
//! Includes tracing initialization and the JSON rendering of entries.

use std::io::Write;

use anyhow::{Context, Result};
use kvmemory_store::Entry;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// Logs go to stderr so stdout stays machine-readable.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// JSON shape of an entry on stdout.
#[derive(Debug, Serialize)]
pub struct EntryView {
    pub id: Option<u64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub key: String,
    pub name: String,
    /// Stored bytes decoded as UTF-8; invalid sequences become U+FFFD.
    pub value: String,
}

impl From<&Entry> for EntryView {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id,
            created_at: entry.created_at.map(|t| t.to_rfc3339()),
            updated_at: entry.updated_at.map(|t| t.to_rfc3339()),
            key: entry.key.clone(),
            name: entry.name.clone(),
            value: String::from_utf8_lossy(&entry.value).into_owned(),
        }
    }
}

/// Write each entry as one JSON line.
pub fn print_entries<'a, W, I>(out: &mut W, entries: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a Entry>,
{
    for entry in entries {
        print_json(out, &EntryView::from(entry))?;
    }
    Ok(())
}

/// Write any serializable value as one JSON line.
pub fn print_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value).context("failed to encode output")?;
    writeln!(out).context("failed to write output")?;
    Ok(())
}
