//! Parquet output for data products.
//!
//! This crate compiles a data-product definition into a columnar schema and
//! turns batches of input messages into one SNAPPY-compressed Parquet blob
//! per batch.
//!
//! # Example
//!
//! ```no_run
//! use dataproducts_parquet::{BatchConversionEngine, EngineConfig, Message};
//! use dataproducts_parser::CatalogStore;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::builder()
//!     .data_product_id("75d44fdc-dffd-42ea-af06-06fa4cb6fdbd")
//!     .build()?;
//! let engine = BatchConversionEngine::new(CatalogStore::new("catalog/dev"), config)?;
//!
//! let batch = vec![Message::from_json_bytes(
//!     br#"{"citizen_id": "75d44fdc-dffd-42ea-af06-06fa4cb6fdbd"}"#.to_vec(),
//! )];
//! if let Some(output) = engine.process_batch(&batch)? {
//!     std::fs::write("citizens.parquet", &output.blob)?;
//! }
//! # Ok(())
//! # }
//! ```

use dataproducts_core::DefinitionError;
use dataproducts_parser::ParserError;
use dataproducts_validator::ConversionError;
use thiserror::Error;

mod config;
mod engine;
mod schema;
mod writer;

pub use config::{CompressionCodec, EngineConfig, EngineConfigBuilder, InputMode};
pub use engine::{BatchConversionEngine, ConvertedBatch, Message};
pub use schema::{
    ColumnSchema, ColumnarSchema, LogicalType, PhysicalType, SEMANTIC_TYPE_KEY, to_columnar_schema,
};
pub use writer::{ColumnarWriter, WriterOptions};

/// Schema metadata key holding the data-product id.
pub const DATA_PRODUCT_ID_KEY: &str = "data_product_id";

/// Schema metadata key holding the creation timestamp (seconds since the epoch).
pub const CREATED_AT_KEY: &str = "created_at";

/// Error types for columnar conversion.
#[derive(Error, Debug)]
pub enum ColumnarError {
    /// The governing definition could not be resolved
    #[error("Could not resolve data product definition: {0}")]
    Catalog(#[from] ParserError),

    /// The definition could not be compiled into a columnar schema
    #[error("Invalid columnar schema: {0}")]
    Schema(#[from] DefinitionError),

    /// A converter could not be built for the definition
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A row failed validation or conversion
    #[error("Row {index}: {source}")]
    Row {
        /// Position of the row within the batch
        index: usize,
        /// Underlying conversion failure
        #[source]
        source: ConversionError,
    },

    /// A message could not be decoded as JSON
    #[error("Failed to decode message {index}: {source}")]
    Decode {
        /// Position of the message within the batch
        index: usize,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Building the record batch failed
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    /// Encoding the Parquet file failed
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// A required column received no value
    #[error("Column '{0}' is required but the row has no value for it")]
    NullInRequiredColumn(String),

    /// A converted value does not fit the column's type
    #[error("Column '{column}' expects {expected} but got {found}")]
    ColumnMismatch {
        /// Column name
        column: String,
        /// Expected column type
        expected: String,
        /// Kind of the offending value
        found: String,
    },

    /// Invalid engine configuration
    #[error("Invalid engine configuration: {0}")]
    Configuration(String),
}

impl ColumnarError {
    /// The row-level conversion failure behind this error, if any.
    pub fn conversion(&self) -> Option<&ConversionError> {
        match self {
            ColumnarError::Row { source, .. } | ColumnarError::Conversion(source) => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for columnar operations.
pub type Result<T> = std::result::Result<T, ColumnarError>;
