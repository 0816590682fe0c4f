//! The entry store.
//!
//! [`Memory`] is the contract application code programs against;
//! [`EntryStore`] is its SQL implementation. Each operation is a single
//! autocommit statement (save may fall back to a second one), so no
//! transaction is ever opened.
//!
//! Not-found is reported asymmetrically on purpose: existence checks and
//! listings answer `false` / empty, while [`Memory::get_entry`] fails with
//! [`StoreError::NotFound`].

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Any, QueryBuilder};
use tracing::{debug, info, instrument};

use crate::clock::SessionClock;
use crate::config::StoreConfig;
use crate::db::Database;
use crate::entry::{Entry, EntryFilter};
use crate::error::{StoreError, StoreResult};
use crate::schema;

const COLUMNS: &str = "`id`, `created_at`, `updated_at`, `key`, `name`, `value`";

/// CRUD/query contract over stored entries.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Whether any entry matches every constraint set on `probe`.
    async fn is_entry_exists(&self, probe: &EntryFilter) -> StoreResult<bool>;

    /// Every stored entry, oldest id first.
    async fn get_all_entries(&self) -> StoreResult<Vec<Entry>>;

    /// Entries whose **key** equals `name_pattern`.
    ///
    /// Despite the name this is neither a name lookup nor a `LIKE` match;
    /// callers rely on the key-equality behavior.
    async fn get_entries_like_name(&self, name_pattern: &str) -> StoreResult<Vec<Entry>>;

    /// The lowest-id entry with this key.
    async fn get_entry(&self, key: &str) -> StoreResult<Entry>;

    /// Insert (no id, or id 0) or fully replace (id set) an entry, returning
    /// its id.
    async fn save_entry(&self, entry: Entry) -> StoreResult<u64>;
}

/// Shareable, type-erased store handle.
pub type StoreHandle = Arc<dyn Memory>;

/// Open a store and erase its concrete type.
pub async fn open_store(config: &StoreConfig) -> StoreResult<StoreHandle> {
    Ok(Arc::new(EntryStore::open(config).await?))
}

/// SQL-backed [`Memory`].
#[derive(Clone)]
pub struct EntryStore {
    db: Database,
    clock: SessionClock,
    table: String,
}

impl EntryStore {
    /// Connect, verify liveness and create the entries table if needed.
    ///
    /// Nothing is returned unless all three steps succeed.
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let clock = SessionClock::from_name(&config.location)?;
        let db = Database::connect(config).await?;

        let table = config.entries_table();
        schema::ensure_entries_table(&db, &table).await?;

        info!(table = %table, timezone = %clock.timezone(), "entry store ready");
        Ok(Self { db, clock, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn clock(&self) -> SessionClock {
        self.clock
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn update_row(&self, id: i64, now: i64, entry: &Entry) -> StoreResult<u64> {
        let sql = format!(
            "UPDATE `{}` SET `updated_at` = ?, `key` = ?, `name` = ?, `value` = ? WHERE `id` = ?",
            self.table
        );
        self.db
            .timed("save_entry", &sql, async {
                let result = sqlx::query(&sql)
                    .bind(now)
                    .bind(entry.key.as_str())
                    .bind(entry.name.as_str())
                    .bind(entry.value.as_slice())
                    .bind(id)
                    .execute(self.db.pool())
                    .await
                    .map_err(StoreError::Persistence)?;
                Ok::<_, StoreError>(result.rows_affected())
            })
            .await
    }

    async fn insert_row(&self, id: Option<i64>, now: i64, entry: &Entry) -> StoreResult<u64> {
        let sql = match id {
            Some(_) => format!("INSERT INTO `{}` ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)", self.table),
            None => format!(
                "INSERT INTO `{}` (`created_at`, `updated_at`, `key`, `name`, `value`) VALUES (?, ?, ?, ?, ?)",
                self.table
            ),
        };

        self.db
            .timed("save_entry", &sql, async {
                let mut query = sqlx::query(&sql);
                if let Some(id) = id {
                    query = query.bind(id);
                }
                let result = query
                    .bind(now)
                    .bind(now)
                    .bind(entry.key.as_str())
                    .bind(entry.name.as_str())
                    .bind(entry.value.as_slice())
                    .execute(self.db.pool())
                    .await
                    .map_err(StoreError::Persistence)?;

                let assigned = id.or(result.last_insert_id()).ok_or_else(|| {
                    StoreError::Persistence(sqlx::Error::Protocol(
                        "backend did not report an insert id".into(),
                    ))
                })?;
                from_db_id(assigned).map_err(StoreError::Persistence)
            })
            .await
    }
}

#[async_trait]
impl Memory for EntryStore {
    #[instrument(skip(self))]
    async fn is_entry_exists(&self, probe: &EntryFilter) -> StoreResult<bool> {
        let mut qb = QueryBuilder::<Any>::new(format!("SELECT `id` FROM `{}`", self.table));
        push_filter(&mut qb, probe)?;
        qb.push(" ORDER BY `id` LIMIT 1");
        let sql = qb.sql().to_owned();

        let found = self
            .db
            .timed("is_entry_exists", &sql, async {
                let row = qb.build().fetch_optional(self.db.pool()).await?;
                Ok::<_, StoreError>(row.is_some())
            })
            .await?;

        debug!(found, "existence check");
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn get_all_entries(&self) -> StoreResult<Vec<Entry>> {
        let sql = format!("SELECT {COLUMNS} FROM `{}` ORDER BY `id`", self.table);

        let rows = self
            .db
            .timed("get_all_entries", &sql, async {
                Ok::<_, StoreError>(
                    sqlx::query_as::<_, EntryRow>(&sql)
                        .fetch_all(self.db.pool())
                        .await?,
                )
            })
            .await?;

        rows.into_iter()
            .map(|row| row.into_entry(&self.clock))
            .collect()
    }

    #[instrument(skip(self))]
    async fn get_entries_like_name(&self, name_pattern: &str) -> StoreResult<Vec<Entry>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM `{}` WHERE `key` = ? ORDER BY `id`",
            self.table
        );

        let rows = self
            .db
            .timed("get_entries_like_name", &sql, async {
                Ok::<_, StoreError>(
                    sqlx::query_as::<_, EntryRow>(&sql)
                        .bind(name_pattern)
                        .fetch_all(self.db.pool())
                        .await?,
                )
            })
            .await?;

        rows.into_iter()
            .map(|row| row.into_entry(&self.clock))
            .collect()
    }

    #[instrument(skip(self))]
    async fn get_entry(&self, key: &str) -> StoreResult<Entry> {
        let sql = format!(
            "SELECT {COLUMNS} FROM `{}` WHERE `key` = ? ORDER BY `id` LIMIT 1",
            self.table
        );

        let row = self
            .db
            .timed("get_entry", &sql, async {
                sqlx::query_as::<_, EntryRow>(&sql)
                    .bind(key)
                    .fetch_optional(self.db.pool())
                    .await?
                    .ok_or_else(|| StoreError::NotFound {
                        key: key.to_string(),
                    })
            })
            .await?;

        row.into_entry(&self.clock)
    }

    #[instrument(skip(self, entry), fields(key = %entry.key, id = ?entry.id))]
    async fn save_entry(&self, entry: Entry) -> StoreResult<u64> {
        check_text_len("key", &entry.key)?;
        check_text_len("name", &entry.name)?;
        let now = self.clock.now().timestamp_micros();

        // Id 0 is never a stored row; treat it like an unsaved entry.
        let Some(id) = entry.id.filter(|&id| id != 0) else {
            let id = self.insert_row(None, now, &entry).await?;
            debug!(id, "entry inserted");
            return Ok(id);
        };

        let db_id = to_db_id(id)?;
        if self.update_row(db_id, now, &entry).await? > 0 {
            debug!(id, "entry updated");
            return Ok(id);
        }

        // The row is gone (or never existed): keep the caller's id.
        self.insert_row(Some(db_id), now, &entry).await?;
        debug!(id, "entry re-inserted under existing id");
        Ok(id)
    }
}

// ── row mapping ──────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: i64,
    created_at: i64,
    updated_at: i64,
    key: String,
    name: String,
    value: Vec<u8>,
}

impl EntryRow {
    fn into_entry(self, clock: &SessionClock) -> StoreResult<Entry> {
        Ok(Entry {
            id: Some(from_db_id(self.id)?),
            created_at: Some(timestamp(clock, self.created_at)?),
            updated_at: Some(timestamp(clock, self.updated_at)?),
            key: self.key,
            name: self.name,
            value: self.value,
        })
    }
}

fn timestamp(clock: &SessionClock, micros: i64) -> StoreResult<chrono::DateTime<chrono_tz::Tz>> {
    clock
        .at_micros(micros)
        .ok_or_else(|| {
            StoreError::Backend(sqlx::Error::Decode(
                format!("timestamp out of range: {micros}").into(),
            ))
        })
}

fn check_text_len(column: &str, text: &str) -> StoreResult<()> {
    let len = text.chars().count();
    if len > schema::MAX_TEXT_LEN {
        return Err(StoreError::InvalidArgument(format!(
            "entry {column} is {len} characters, limit is {}",
            schema::MAX_TEXT_LEN
        )));
    }
    Ok(())
}

fn to_db_id(id: u64) -> StoreResult<i64> {
    i64::try_from(id).map_err(|_| StoreError::InvalidArgument(format!("entry id {id} exceeds i64::MAX")))
}

fn from_db_id(id: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(id).map_err(|_| sqlx::Error::Decode(format!("negative entry id {id}").into()))
}

fn push_filter(qb: &mut QueryBuilder<'_, Any>, filter: &EntryFilter) -> StoreResult<()> {
    let mut first = true;

    if let Some(id) = filter.id {
        push_condition(qb, &mut first, "id");
        qb.push_bind(to_db_id(id)?);
    }
    if let Some(created_at) = filter.created_at {
        push_condition(qb, &mut first, "created_at");
        qb.push_bind(created_at.timestamp_micros());
    }
    if let Some(updated_at) = filter.updated_at {
        push_condition(qb, &mut first, "updated_at");
        qb.push_bind(updated_at.timestamp_micros());
    }
    if let Some(key) = &filter.key {
        push_condition(qb, &mut first, "key");
        qb.push_bind(key.clone());
    }
    if let Some(name) = &filter.name {
        push_condition(qb, &mut first, "name");
        qb.push_bind(name.clone());
    }
    if let Some(value) = &filter.value {
        push_condition(qb, &mut first, "value");
        qb.push_bind(value.clone());
    }
    Ok(())
}

fn push_condition(qb: &mut QueryBuilder<'_, Any>, first: &mut bool, column: &str) {
    qb.push(if std::mem::take(first) { " WHERE " } else { " AND " });
    qb.push(format_args!("`{column}` = "));
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn render(filter: &EntryFilter) -> String {
        let mut qb = QueryBuilder::<Any>::new("SELECT `id` FROM `entries`");
        push_filter(&mut qb, filter).unwrap();
        qb.sql().to_owned()
    }

    #[test]
    fn empty_filter_adds_no_where_clause() {
        assert_eq!(render(&EntryFilter::new()), "SELECT `id` FROM `entries`");
    }

    #[test]
    fn filter_columns_are_anded() {
        let sql = render(&EntryFilter::new().key("cfg:a").name(""));
        assert_eq!(sql, "SELECT `id` FROM `entries` WHERE `key` = ? AND `name` = ?");
    }

    #[test]
    fn oversized_id_is_rejected() {
        let mut qb = QueryBuilder::<Any>::new("SELECT 1");
        let err = push_filter(&mut qb, &EntryFilter::new().id(u64::MAX)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn text_limit_counts_characters() {
        assert!(check_text_len("key", &"k".repeat(schema::MAX_TEXT_LEN)).is_ok());
        assert!(check_text_len("key", &"ё".repeat(schema::MAX_TEXT_LEN)).is_ok());
        let err = check_text_len("name", &"n".repeat(schema::MAX_TEXT_LEN + 1)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn id_conversion_round_trips() {
        assert_eq!(to_db_id(42).unwrap(), 42);
        assert_eq!(from_db_id(42).unwrap(), 42);
        assert!(from_db_id(-1).is_err());
    }
}
