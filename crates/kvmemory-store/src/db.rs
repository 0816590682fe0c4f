//! Pooled connection to the relational backend.
//!
//! [`Database`] wraps a sqlx `AnyPool`, so the same store code runs against
//! MySQL and SQLite. The pool is opened lazily and then probed with an
//! explicit ping, so a returned `Database` is known to be reachable.

use std::future::Future;
use std::time::{Duration, Instant};

use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{AnyPool, ConnectOptions, Connection};
use tracing::{Level, debug, error, info, warn};

use crate::config::{Driver, StoreConfig};
use crate::error::{StoreError, StoreResult};

/// Statements slower than this are logged at `WARN`.
pub const SLOW_QUERY_THRESHOLD: Duration = Duration::from_secs(3);

/// Connections above the idle floor are closed after sitting idle this long.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Thread-safe handle to the connection pool.
///
/// Cloning is cheap; all clones share one pool.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
    driver: Driver,
    log: QueryLog,
}

impl Database {
    /// Open the pool described by `config` and verify it with a ping.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        sqlx::any::install_default_drivers();

        let url = config.connection_url()?;
        let options = AnyConnectOptions::from_url(&url)
            .map_err(StoreError::Connection)?
            .disable_statement_logging();

        info!(
            url = %config.redacted_url(),
            max_open = config.max_open_conns,
            max_idle = config.max_idle_conns,
            "opening connection pool"
        );

        // Limits are part of the options, so the probe below already
        // goes through admission control.
        let pool = pool_options(config).connect_lazy_with(options);

        let db = Self {
            pool,
            driver: config.driver,
            log: QueryLog {
                slow_threshold: SLOW_QUERY_THRESHOLD,
                debug: config.debug_mode,
            },
        };
        db.ping().await?;

        info!(driver = %db.driver, "database reachable");
        Ok(db)
    }

    /// Round-trip to the backend on a pooled connection.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::Connection)?;
        conn.ping().await.map_err(StoreError::Connection)?;
        debug!("ping ok");
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    /// Run `fut` and log it the way the store logs every statement.
    pub(crate) async fn timed<T, F>(&self, op: &'static str, sql: &str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let started = Instant::now();
        let result = fut.await;
        self.log.observe(op, sql, started.elapsed(), &result);
        result
    }
}

fn pool_options(config: &StoreConfig) -> AnyPoolOptions {
    let max_open = config.max_open_conns;
    let lifetime = config.conn_max_lifetime();

    AnyPoolOptions::new()
        .max_connections(max_open)
        .min_connections(config.max_idle_conns.min(max_open))
        .acquire_timeout(config.conn_timeout())
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime((!lifetime.is_zero()).then_some(lifetime))
}

// ── query logging ────────────────────────────────────────────────────

/// Slow/failed statement logger.
///
/// Not-found misses are never logged as errors; debug mode additionally
/// logs every statement.
#[derive(Debug, Clone, Copy)]
struct QueryLog {
    slow_threshold: Duration,
    debug: bool,
}

impl QueryLog {
    /// Log one statement; returns the level used, or `None` when silent.
    fn observe<T>(
        &self,
        op: &str,
        sql: &str,
        elapsed: Duration,
        result: &StoreResult<T>,
    ) -> Option<Level> {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        if let Err(err) = result {
            if !err.is_not_found() {
                error!(op, sql, elapsed_ms, error = %err, "query failed");
                return Some(Level::ERROR);
            }
        }

        if elapsed >= self.slow_threshold {
            warn!(
                op,
                sql,
                elapsed_ms,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "slow query"
            );
            Some(Level::WARN)
        } else if self.debug {
            info!(op, sql, elapsed_ms, "query");
            Some(Level::INFO)
        } else {
            None
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_config(dir: &tempfile::TempDir) -> StoreConfig {
        StoreConfig::sqlite(dir.path().join("kv.db").to_string_lossy().into_owned())
    }

    #[test]
    fn pool_options_follow_config() {
        let config = StoreConfig {
            max_open_conns: 4,
            max_idle_conns: 9,
            conn_max_lifetime_mins: 2,
            conn_timeout_ms: 250,
            ..StoreConfig::sqlite("/tmp/kv.db")
        };
        let options = pool_options(&config);
        assert_eq!(options.get_max_connections(), 4);
        // Idle floor never exceeds the open limit.
        assert_eq!(options.get_min_connections(), 4);
        assert_eq!(options.get_acquire_timeout(), Duration::from_millis(250));
        assert_eq!(options.get_max_lifetime(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn zero_lifetime_means_unlimited() {
        let config = StoreConfig {
            conn_max_lifetime_mins: 0,
            ..StoreConfig::sqlite("/tmp/kv.db")
        };
        assert_eq!(pool_options(&config).get_max_lifetime(), None);
    }

    #[tokio::test]
    async fn connect_and_ping_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(&sqlite_config(&dir)).await.unwrap();
        assert_eq!(db.driver(), Driver::Sqlite);
        db.ping().await.unwrap();
        assert!(dir.path().join("kv.db").exists());
    }

    #[tokio::test]
    async fn connect_rejects_incomplete_config() {
        let err = Database::connect(&StoreConfig::default()).await.err().unwrap();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connection_error() {
        let config = StoreConfig {
            host: "127.0.0.1".into(),
            port: 1,
            name: "kv".into(),
            user: "app".into(),
            conn_timeout_ms: 300,
            max_idle_conns: 0,
            ..StoreConfig::default()
        };
        let err = Database::connect(&config).await.err().unwrap();
        assert!(matches!(err, StoreError::Connection(_)), "got {err:?}");
    }

    fn query_log(debug: bool) -> QueryLog {
        QueryLog {
            slow_threshold: SLOW_QUERY_THRESHOLD,
            debug,
        }
    }

    const FAST: Duration = Duration::from_millis(2);

    #[test]
    fn fast_success_is_silent_outside_debug() {
        let ok: StoreResult<()> = Ok(());
        assert_eq!(query_log(false).observe("get", "SELECT 1", FAST, &ok), None);
    }

    #[test]
    fn debug_mode_logs_every_statement() {
        let ok: StoreResult<()> = Ok(());
        assert_eq!(
            query_log(true).observe("get", "SELECT 1", FAST, &ok),
            Some(Level::INFO)
        );
    }

    #[test]
    fn slow_statement_is_a_warning() {
        let ok: StoreResult<()> = Ok(());
        for debug in [false, true] {
            assert_eq!(
                query_log(debug).observe("get", "SELECT 1", SLOW_QUERY_THRESHOLD, &ok),
                Some(Level::WARN)
            );
        }
    }

    #[test]
    fn failure_is_an_error_even_when_slow() {
        let failed: StoreResult<()> = Err(StoreError::Backend(sqlx::Error::PoolTimedOut));
        assert_eq!(
            query_log(false).observe("get", "SELECT 1", FAST, &failed),
            Some(Level::ERROR)
        );
        assert_eq!(
            query_log(false).observe("get", "SELECT 1", Duration::from_secs(10), &failed),
            Some(Level::ERROR)
        );
    }

    #[test]
    fn not_found_is_not_an_error() {
        let miss: StoreResult<()> = Err(StoreError::NotFound { key: "k".into() });
        assert_eq!(query_log(false).observe("get", "SELECT 1", FAST, &miss), None);
        assert_eq!(
            query_log(true).observe("get", "SELECT 1", FAST, &miss),
            Some(Level::INFO)
        );
        assert_eq!(
            query_log(false).observe("get", "SELECT 1", SLOW_QUERY_THRESHOLD, &miss),
            Some(Level::WARN)
        );
    }

    #[tokio::test]
    async fn timed_passes_result_through() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(&sqlite_config(&dir)).await.unwrap();

        let ok = db.timed("noop", "SELECT 1", async { Ok::<_, StoreError>(7) }).await.unwrap();
        assert_eq!(ok, 7);

        let miss: StoreResult<()> = db
            .timed("miss", "SELECT 1", async {
                Err::<(), _>(StoreError::NotFound { key: "k".into() })
            })
            .await;
        assert!(miss.unwrap_err().is_not_found());
    }
}
