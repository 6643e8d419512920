//! Configuration for the batch conversion engine.

use crate::ColumnarError;
use parquet::basic::Compression;
use serde::{Deserialize, Serialize};

/// Default `created_by` string written into the Parquet footer.
pub const DEFAULT_CREATED_BY: &str = concat!("dataproducts ", env!("CARGO_PKG_VERSION"));

/// How input messages map onto rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Every message is one row (an attribute map)
    #[default]
    Single,
    /// Every message is a sequence of rows
    Bulk,
}

/// Compression codec for the output file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    /// No compression
    Uncompressed,
    /// SNAPPY
    #[default]
    Snappy,
}

impl CompressionCodec {
    pub(crate) fn to_parquet(self) -> Compression {
        match self {
            CompressionCodec::Uncompressed => Compression::UNCOMPRESSED,
            CompressionCodec::Snappy => Compression::SNAPPY,
        }
    }
}

/// Configuration for a [`BatchConversionEngine`](crate::BatchConversionEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Id of the data product governing every batch
    pub data_product_id: String,

    /// Output compression
    #[serde(default)]
    pub compression: CompressionCodec,

    /// How messages map onto rows
    #[serde(default)]
    pub input_mode: InputMode,

    /// Writer identification recorded in the file footer
    #[serde(default = "default_created_by")]
    pub created_by: String,

    /// Creation timestamp (seconds since the epoch) recorded in the schema metadata
    #[serde(default)]
    pub created_at: Option<i64>,
}

fn default_created_by() -> String {
    DEFAULT_CREATED_BY.to_string()
}

impl EngineConfig {
    /// Creates a new builder for `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ColumnarError> {
        if self.data_product_id.trim().is_empty() {
            return Err(ColumnarError::Configuration(
                "data_product_id cannot be empty".to_string(),
            ));
        }

        if self.created_by.is_empty() {
            return Err(ColumnarError::Configuration(
                "created_by cannot be empty".to_string(),
            ));
        }

        if matches!(self.created_at, Some(ts) if ts < 0) {
            return Err(ColumnarError::Configuration(
                "created_at cannot be before the epoch".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for `EngineConfig`.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    data_product_id: Option<String>,
    compression: CompressionCodec,
    input_mode: InputMode,
    created_by: Option<String>,
    created_at: Option<i64>,
}

impl EngineConfigBuilder {
    /// Sets the governing data-product id.
    pub fn data_product_id<S: Into<String>>(mut self, id: S) -> Self {
        self.data_product_id = Some(id.into());
        self
    }

    /// Sets the compression codec.
    pub fn compression(mut self, compression: CompressionCodec) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the input mode.
    pub fn input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = mode;
        self
    }

    /// Sets the writer identification.
    pub fn created_by<S: Into<String>>(mut self, created_by: S) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    /// Sets the creation timestamp in seconds since the epoch.
    pub fn created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Builds the `EngineConfig`.
    ///
    /// Returns an error if the data-product id is missing or invalid.
    pub fn build(self) -> Result<EngineConfig, ColumnarError> {
        let config = EngineConfig {
            data_product_id: self.data_product_id.ok_or_else(|| {
                ColumnarError::Configuration("data_product_id is required".to_string())
            })?,
            compression: self.compression,
            input_mode: self.input_mode,
            created_by: self.created_by.unwrap_or_else(default_created_by),
            created_at: self.created_at,
        };

        config.validate()?;
        Ok(config)
    }
}
