//! Configuration for query sources.

use crate::{Result, SourceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// PostgreSQL through tokio-postgres
    Postgres,
    /// SQLite through rusqlite
    Sqlite,
}

impl FromStr for Driver {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Driver::Postgres),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(SourceError::configuration(format!(
                "unsupported driver '{other}' (expected postgres or sqlite)"
            ))),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Postgres => write!(f, "postgres"),
            Driver::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Connection pool tuning.
///
/// A cursor holds a single connection, so these values are validated and
/// logged but only bound how a connection may be reused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum number of open connections
    #[serde(default)]
    pub max_open_conns: Option<u32>,

    /// Maximum number of idle connections
    #[serde(default)]
    pub max_idle_conns: Option<u32>,

    /// Maximum connection lifetime in seconds
    #[serde(default, rename = "conn_max_lifetime")]
    pub conn_max_lifetime_secs: Option<u64>,
}

impl PoolSettings {
    /// Returns the maximum connection lifetime.
    pub fn conn_max_lifetime(&self) -> Option<Duration> {
        self.conn_max_lifetime_secs.map(Duration::from_secs)
    }

    /// Validates the pool settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_open_conns == Some(0) {
            return Err(SourceError::configuration(
                "max_open_conns must be at least 1",
            ));
        }

        if let (Some(idle), Some(open)) = (self.max_idle_conns, self.max_open_conns) {
            if idle > open {
                return Err(SourceError::configuration(format!(
                    "max_idle_conns ({idle}) cannot exceed max_open_conns ({open})"
                )));
            }
        }

        if self.conn_max_lifetime_secs == Some(0) {
            return Err(SourceError::configuration(
                "conn_max_lifetime must be positive",
            ));
        }

        Ok(())
    }
}

/// Configuration for a [`QueryCursor`](crate::QueryCursor).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Driver name (`postgres`, `postgresql`, `sqlite`)
    pub driver: String,

    /// Data source name: a connection string or a SQLite path
    pub dsn: String,

    /// Static query executed once on connect
    pub query: String,

    /// Pool tuning
    #[serde(default)]
    pub pool: PoolSettings,
}

impl fmt::Debug for SourceConfig {
    // The DSN may carry credentials.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("driver", &self.driver)
            .field("dsn", &"<redacted>")
            .field("query", &self.query)
            .field("pool", &self.pool)
            .finish()
    }
}

impl SourceConfig {
    /// Creates a new builder for `SourceConfig`.
    pub fn builder() -> SourceConfigBuilder {
        SourceConfigBuilder::default()
    }

    /// Parses the driver name.
    pub fn driver(&self) -> Result<Driver> {
        self.driver.parse()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        self.driver()?;

        if self.dsn.trim().is_empty() {
            return Err(SourceError::configuration("dsn cannot be empty"));
        }

        if self.query.trim().is_empty() {
            return Err(SourceError::configuration("query cannot be empty"));
        }

        self.pool.validate()
    }
}

/// Builder for `SourceConfig`.
#[derive(Debug, Clone, Default)]
pub struct SourceConfigBuilder {
    driver: Option<String>,
    dsn: Option<String>,
    query: Option<String>,
    pool: PoolSettings,
}

impl SourceConfigBuilder {
    /// Sets the driver name.
    pub fn driver<S: Into<String>>(mut self, driver: S) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Sets the data source name.
    pub fn dsn<S: Into<String>>(mut self, dsn: S) -> Self {
        self.dsn = Some(dsn.into());
        self
    }

    /// Sets the static query.
    pub fn query<S: Into<String>>(mut self, query: S) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Sets the pool tuning.
    pub fn pool(mut self, pool: PoolSettings) -> Self {
        self.pool = pool;
        self
    }

    /// Builds the `SourceConfig`.
    ///
    /// Returns an error if a required field is missing or invalid.
    pub fn build(self) -> Result<SourceConfig> {
        let config = SourceConfig {
            driver: self
                .driver
                .ok_or_else(|| SourceError::configuration("driver is required"))?,
            dsn: self
                .dsn
                .ok_or_else(|| SourceError::configuration("dsn is required"))?,
            query: self
                .query
                .ok_or_else(|| SourceError::configuration("query is required"))?,
            pool: self.pool,
        };

        config.validate()?;
        Ok(config)
    }
}
