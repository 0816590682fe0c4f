//! Store configuration.
//!
//! [`StoreConfig`] carries everything needed to reach the backend and shape
//! the pool. It deserializes from the `DB_*` variable names so the same
//! struct can be filled from JSON/TOML or, via [`StoreConfig::from_env`],
//! from the process environment.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{StoreError, StoreResult};

/// Suffix of the entries table; the effective prefix is prepended.
const ENTRIES_TABLE: &str = "entries";

/// Relational backend the store talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// MySQL / MariaDB over TCP.
    #[default]
    Mysql,
    /// File-backed SQLite; `DB_NAME` is the file path.
    Sqlite,
}

impl Driver {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl FromStr for Driver {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::Mysql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(StoreError::Configuration(format!(
                "unknown DB_DRIVER: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection, pool and session settings for the entry store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(rename = "DB_DRIVER", default)]
    pub driver: Driver,
    #[serde(rename = "DB_HOST", default = "default_host")]
    pub host: String,
    #[serde(rename = "DB_PORT", default = "default_port")]
    pub port: u16,
    /// Database name (MySQL) or database file path (SQLite). Required.
    #[serde(rename = "DB_NAME", default)]
    pub name: String,
    /// Required for MySQL.
    #[serde(rename = "DB_USER", default)]
    pub user: String,
    #[serde(rename = "DB_PASSWORD", default)]
    pub password: String,
    /// Upper bound on acquiring a connection, in milliseconds.
    #[serde(rename = "DB_CONN_TIMEOUT", default = "default_conn_timeout_ms")]
    pub conn_timeout_ms: u64,
    #[serde(rename = "DB_TABLE_PREFIX", default)]
    pub table_prefix: String,

    #[serde(rename = "DB_MAX_OPEN_CONNS", default = "default_max_open_conns")]
    pub max_open_conns: u32,
    #[serde(rename = "DB_MAX_IDLE_CONNS", default = "default_max_idle_conns")]
    pub max_idle_conns: u32,
    #[serde(
        rename = "DB_CONN_MAX_LIFETIME_MINS",
        default = "default_conn_max_lifetime_mins"
    )]
    pub conn_max_lifetime_mins: u64,

    /// Log every statement, not only slow or failed ones.
    #[serde(rename = "DB_GORM_DEBUG_MODE", default)]
    pub debug_mode: bool,
    /// IANA timezone used by the session clock.
    #[serde(rename = "DB_TIME_LOCATION", default = "default_location")]
    pub location: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_conn_timeout_ms() -> u64 {
    5000
}

fn default_max_open_conns() -> u32 {
    10
}

fn default_max_idle_conns() -> u32 {
    5
}

fn default_conn_max_lifetime_mins() -> u64 {
    5
}

fn default_location() -> String {
    "Europe/Moscow".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            driver: Driver::default(),
            host: default_host(),
            port: default_port(),
            name: String::new(),
            user: String::new(),
            password: String::new(),
            conn_timeout_ms: default_conn_timeout_ms(),
            table_prefix: String::new(),
            max_open_conns: default_max_open_conns(),
            max_idle_conns: default_max_idle_conns(),
            conn_max_lifetime_mins: default_conn_max_lifetime_mins(),
            debug_mode: false,
            location: default_location(),
        }
    }
}

impl StoreConfig {
    /// Config for a file-backed SQLite database at `path`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: Driver::Sqlite,
            name: path.into(),
            ..Self::default()
        }
    }

    /// Read the `DB_*` variables from the process environment.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    ///
    /// Missing variables fall back to their defaults; present but
    /// unparsable ones are a [`StoreError::Configuration`].
    pub fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("DB_DRIVER") {
            cfg.driver = v.parse()?;
        }
        if let Some(v) = lookup("DB_HOST") {
            cfg.host = v;
        }
        if let Some(v) = lookup("DB_PORT") {
            cfg.port = parse_var("DB_PORT", &v)?;
        }
        if let Some(v) = lookup("DB_NAME") {
            cfg.name = v;
        }
        if let Some(v) = lookup("DB_USER") {
            cfg.user = v;
        }
        if let Some(v) = lookup("DB_PASSWORD") {
            cfg.password = v;
        }
        if let Some(v) = lookup("DB_CONN_TIMEOUT") {
            cfg.conn_timeout_ms = parse_var("DB_CONN_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("DB_TABLE_PREFIX") {
            cfg.table_prefix = v;
        }
        if let Some(v) = lookup("DB_MAX_OPEN_CONNS") {
            cfg.max_open_conns = parse_var("DB_MAX_OPEN_CONNS", &v)?;
        }
        if let Some(v) = lookup("DB_MAX_IDLE_CONNS") {
            cfg.max_idle_conns = parse_var("DB_MAX_IDLE_CONNS", &v)?;
        }
        if let Some(v) = lookup("DB_CONN_MAX_LIFETIME_MINS") {
            cfg.conn_max_lifetime_mins = parse_var("DB_CONN_MAX_LIFETIME_MINS", &v)?;
        }
        if let Some(v) = lookup("DB_GORM_DEBUG_MODE") {
            cfg.debug_mode = parse_var("DB_GORM_DEBUG_MODE", &v)?;
        }
        if let Some(v) = lookup("DB_TIME_LOCATION") {
            cfg.location = v;
        }

        Ok(cfg)
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::Configuration("DB_NAME is required".into()));
        }
        if self.driver == Driver::Mysql && self.user.trim().is_empty() {
            return Err(StoreError::Configuration("DB_USER is required".into()));
        }
        if self.max_open_conns == 0 {
            return Err(StoreError::Configuration(
                "DB_MAX_OPEN_CONNS must be at least 1".into(),
            ));
        }
        if !self
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StoreError::Configuration(format!(
                "DB_TABLE_PREFIX may only contain ASCII letters, digits and '_': {:?}",
                self.table_prefix
            )));
        }
        Ok(())
    }

    /// Effective table prefix: empty, or the configured prefix plus `_`.
    pub fn effective_prefix(&self) -> String {
        if self.table_prefix.is_empty() {
            String::new()
        } else {
            format!("{}_", self.table_prefix)
        }
    }

    /// Name of the entries table, e.g. `app_entries`.
    pub fn entries_table(&self) -> String {
        format!("{}{ENTRIES_TABLE}", self.effective_prefix())
    }

    /// Connection URL understood by the sqlx `Any` driver.
    ///
    /// Credentials are percent-encoded, so passwords containing `@`, `:`
    /// or `/` survive the round trip.
    pub fn connection_url(&self) -> StoreResult<Url> {
        match self.driver {
            Driver::Mysql => {
                let mut url = Url::parse("mysql://localhost")
                    .map_err(|e| StoreError::Configuration(e.to_string()))?;
                url.set_host(Some(&self.host))
                    .map_err(|e| StoreError::Configuration(format!("DB_HOST: {e}")))?;
                url.set_port(Some(self.port))
                    .map_err(|()| url_error("DB_PORT"))?;
                url.set_username(&self.user)
                    .map_err(|()| url_error("DB_USER"))?;
                if !self.password.is_empty() {
                    url.set_password(Some(&self.password))
                        .map_err(|()| url_error("DB_PASSWORD"))?;
                }
                url.set_path(&format!("/{}", self.name));
                Ok(url)
            }
            Driver::Sqlite => Url::parse(&format!("sqlite://{}?mode=rwc", self.name))
                .map_err(|e| StoreError::Configuration(format!("DB_NAME: {e}"))),
        }
    }

    /// Same as [`connection_url`](Self::connection_url) with the password
    /// masked, for logging.
    pub fn redacted_url(&self) -> String {
        match self.connection_url() {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => format!("{}://<invalid>", self.driver),
        }
    }

    pub fn conn_timeout(&self) -> Duration {
        Duration::from_millis(self.conn_timeout_ms)
    }

    pub fn conn_max_lifetime(&self) -> Duration {
        Duration::from_secs(self.conn_max_lifetime_mins.saturating_mul(60))
    }
}

fn url_error(key: &str) -> StoreError {
    StoreError::Configuration(format!("{key} cannot be used in a connection url"))
}

fn parse_var<T>(key: &str, raw: &str) -> StoreResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| StoreError::Configuration(format!("{key}={raw:?}: {e}")))
}

// ── tests ────────────────────────────────────────────────────────────
