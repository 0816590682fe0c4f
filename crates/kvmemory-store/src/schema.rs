//! Entries table auto-migration.
//!
//! Only "create if missing" is supported: the table and its four secondary
//! indexes are created idempotently, there is no version bookkeeping.
//! Timestamps are stored as microseconds since the Unix epoch.

use tracing::{debug, info};

use crate::config::Driver;
use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// Longest `key` or `name`, in characters, every backend can store.
pub const MAX_TEXT_LEN: usize = 255;

/// Columns that get a secondary index.
const INDEXED_COLUMNS: &[&str] = &["created_at", "updated_at", "key", "name"];

/// DDL that brings `table` into existence for `driver`, in execution order.
pub fn create_statements(driver: Driver, table: &str) -> Vec<String> {
    match driver {
        Driver::Mysql => {
            let indexes: String = INDEXED_COLUMNS
                .iter()
                .map(|col| format!(",\n    INDEX `idx_{table}_{col}` (`{col}`)"))
                .collect();
            vec![format!(
                "CREATE TABLE IF NOT EXISTS `{table}` (
    `id`         BIGINT       NOT NULL AUTO_INCREMENT,
    `created_at` BIGINT       NOT NULL,
    `updated_at` BIGINT       NOT NULL,
    `key`        VARCHAR({MAX_TEXT_LEN}) NOT NULL DEFAULT '',
    `name`       VARCHAR({MAX_TEXT_LEN}) NOT NULL DEFAULT '',
    `value`      LONGBLOB     NOT NULL,
    PRIMARY KEY (`id`){indexes}
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
            )]
        }
        Driver::Sqlite => {
            // AUTOINCREMENT keeps ids from being reused after deletes.
            let mut statements = vec![format!(
                "CREATE TABLE IF NOT EXISTS `{table}` (
    `id`         INTEGER PRIMARY KEY AUTOINCREMENT,
    `created_at` INTEGER NOT NULL,
    `updated_at` INTEGER NOT NULL,
    `key`        TEXT    NOT NULL DEFAULT '',
    `name`       TEXT    NOT NULL DEFAULT '',
    `value`      BLOB    NOT NULL
)"
            )];
            statements.extend(INDEXED_COLUMNS.iter().map(|col| {
                format!("CREATE INDEX IF NOT EXISTS `idx_{table}_{col}` ON `{table}` (`{col}`)")
            }));
            statements
        }
    }
}

/// Make sure the entries table exists. Safe to call on every startup.
pub async fn ensure_entries_table(db: &Database, table: &str) -> StoreResult<()> {
    info!(table, driver = %db.driver(), "ensuring entries table");

    for sql in create_statements(db.driver(), table) {
        db.timed("migrate", &sql, async {
            sqlx::query(&sql)
                .execute(db.pool())
                .await
                .map_err(|source| StoreError::Schema {
                    table: table.to_string(),
                    source,
                })
        })
        .await?;
        debug!(table, "schema statement applied");
    }

    info!(table, "entries table ready");
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    async fn sqlite_db(dir: &tempfile::TempDir) -> Database {
        let path = dir.path().join("schema.db");
        Database::connect(&StoreConfig::sqlite(path.to_string_lossy().into_owned()))
            .await
            .unwrap()
    }

    async fn sqlite_objects(db: &Database, kind: &str) -> Vec<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT name FROM sqlite_master WHERE type = ? AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .bind(kind)
        .fetch_all(db.pool())
        .await
        .unwrap()
    }

    #[test]
    fn mysql_ddl_is_a_single_statement_with_indexes() {
        let statements = create_statements(Driver::Mysql, "app_entries");
        assert_eq!(statements.len(), 1);
        let ddl = &statements[0];
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS `app_entries`"));
        assert!(ddl.contains("AUTO_INCREMENT"));
        assert!(ddl.contains("PRIMARY KEY (`id`)"));
        assert!(ddl.contains("`key`        VARCHAR(255)"));
        for col in INDEXED_COLUMNS {
            assert!(ddl.contains(&format!("INDEX `idx_app_entries_{col}` (`{col}`)")));
        }
    }

    #[test]
    fn sqlite_ddl_creates_indexes_separately() {
        let statements = create_statements(Driver::Sqlite, "entries");
        assert_eq!(statements.len(), 1 + INDEXED_COLUMNS.len());
        assert!(statements[0].contains("AUTOINCREMENT"));
        assert!(statements[1..]
            .iter()
            .all(|s| s.starts_with("CREATE INDEX IF NOT EXISTS")));
    }

    #[tokio::test]
    async fn creates_table_and_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let db = sqlite_db(&dir).await;

        ensure_entries_table(&db, "app_entries").await.unwrap();

        assert_eq!(sqlite_objects(&db, "table").await, vec!["app_entries"]);
        assert_eq!(
            sqlite_objects(&db, "index").await,
            vec![
                "idx_app_entries_created_at",
                "idx_app_entries_key",
                "idx_app_entries_name",
                "idx_app_entries_updated_at",
            ]
        );
    }

    #[tokio::test]
    async fn repeated_runs_are_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let db = sqlite_db(&dir).await;

        ensure_entries_table(&db, "entries").await.unwrap();
        ensure_entries_table(&db, "entries").await.unwrap();

        assert_eq!(sqlite_objects(&db, "table").await, vec!["entries"]);
    }
}
