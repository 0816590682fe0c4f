//! # kvmemory-store
//!
//! A small persistent key-value store on top of one relational table.
//!
//! Entries are opaque byte values addressed by a `key`, labelled with a
//! `name`, and stamped with creation/update times in a configured timezone.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Memory trait  (EntryStore / handle)     │
//! ├─────────────────────────────────────────┤
//! │  Schema        (CREATE TABLE IF NOT ...) │
//! ├─────────────────────────────────────────┤
//! │  Database      (sqlx AnyPool + ping)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use kvmemory_store::{Entry, EntryStore, Memory, StoreConfig};
//!
//! let store = EntryStore::open(&StoreConfig::from_env()?).await?;
//! let id = store.save_entry(Entry::new("cfg:a", "alpha", "1")).await?;
//! let entry = store.get_entry("cfg:a").await?;
//! ```

pub mod clock;
pub mod config;
pub mod db;
pub mod entry;
pub mod error;
pub mod memory;
pub mod schema;

// ── re-exports ───────────────────────────────────────────────────────

pub use clock::SessionClock;
pub use config::{Driver, StoreConfig};
pub use db::Database;
pub use entry::{Entry, EntryFilter};
pub use error::{StoreError, StoreResult};
pub use memory::{EntryStore, Memory, StoreHandle, open_store};
