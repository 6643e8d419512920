//! Driver seam: a row stream per database backend.

use crate::config::{Driver, SourceConfig};
use crate::{Result, postgres, sqlite};
use async_trait::async_trait;
use dataproducts_validator::DataRow;
use tracing::info;

/// An open result stream.
///
/// `next_row` must be cancel-safe: dropping the future before it resolves
/// loses no row.
#[async_trait]
pub trait RowSource: Send {
    /// Returns the next row, `None` once the result set is exhausted.
    async fn next_row(&mut self) -> Option<Result<DataRow>>;

    /// Releases the result stream and its connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens row sources for a cursor.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    /// Connects and starts the query.
    async fn open(&self) -> Result<Box<dyn RowSource>>;

    /// Short label used in log lines.
    fn describe(&self) -> String;
}

#[async_trait]
impl SourceFactory for SourceConfig {
    async fn open(&self) -> Result<Box<dyn RowSource>> {
        open(self).await
    }

    fn describe(&self) -> String {
        self.driver.clone()
    }
}

/// Connects to the configured database and starts the static query.
pub async fn open(config: &SourceConfig) -> Result<Box<dyn RowSource>> {
    let driver = config.driver()?;
    info!(
        "Opening {} source (max_open_conns: {:?}, max_idle_conns: {:?}, conn_max_lifetime: {:?})",
        driver,
        config.pool.max_open_conns,
        config.pool.max_idle_conns,
        config.pool.conn_max_lifetime()
    );

    let source: Box<dyn RowSource> = match driver {
        Driver::Postgres => Box::new(postgres::PostgresSource::open(&config.dsn, &config.query).await?),
        Driver::Sqlite => Box::new(sqlite::SqliteSource::open(&config.dsn, &config.query).await?),
    };
    Ok(source)
}
