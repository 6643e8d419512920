//! # Data Products Source
//!
//! A streaming query cursor that runs one static query against PostgreSQL or
//! SQLite and yields each row as an attribute map ready for the batch
//! conversion engine.
//!
//! ## Example
//!
//! ```no_run
//! use dataproducts_source::{QueryCursor, SourceConfig};
//!
//! # async fn run() -> Result<(), dataproducts_source::SourceError> {
//! let config = SourceConfig::builder()
//!     .driver("sqlite")
//!     .dsn("citizens.db")
//!     .query("SELECT citizen_id FROM citizens")
//!     .build()?;
//!
//! let cursor = QueryCursor::new(config)?;
//! cursor.connect().await?;
//! loop {
//!     match cursor.read().await {
//!         Ok(row) => println!("{row:?}"),
//!         Err(e) if e.is_end_of_input() => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! cursor.close(std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod cursor;
mod driver;
mod error;
mod postgres;
mod shutdown;
mod sqlite;

pub use config::{Driver, PoolSettings, SourceConfig, SourceConfigBuilder};
pub use cursor::{CursorState, QueryCursor};
pub use driver::{RowSource, SourceFactory, open};
pub use error::{Result, SourceError};
