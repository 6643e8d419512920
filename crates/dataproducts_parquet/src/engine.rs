//! Batch conversion engine.
//!
//! Drives catalog lookup, schema compilation, row conversion and columnar
//! encoding for one batch of messages at a time.

use crate::config::{EngineConfig, InputMode};
use crate::schema::to_columnar_schema;
use crate::writer::{ColumnarWriter, WriterOptions};
use crate::{CREATED_AT_KEY, ColumnarError, DATA_PRODUCT_ID_KEY, Result};
use dataproducts_parser::CatalogStore;
use dataproducts_validator::{ConversionError, DataRow, DataValue, RowConverter};
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::{debug, info};

/// One input message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A JSON document
    Bytes(Vec<u8>),
    /// An already decoded value, as produced by a query cursor
    Structured(DataValue),
}

impl Message {
    /// Wraps raw JSON bytes.
    pub fn from_json_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Message::Bytes(bytes.into())
    }

    fn decode(&self) -> std::result::Result<Cow<'_, DataValue>, serde_json::Error> {
        match self {
            Message::Bytes(bytes) => {
                let value: serde_json::Value = serde_json::from_slice(bytes)?;
                Ok(Cow::Owned(DataValue::from_json(value)))
            }
            Message::Structured(value) => Ok(Cow::Borrowed(value)),
        }
    }
}

impl From<DataValue> for Message {
    fn from(value: DataValue) -> Self {
        Message::Structured(value)
    }
}

impl From<DataRow> for Message {
    fn from(row: DataRow) -> Self {
        Message::Structured(DataValue::Map(row))
    }
}

/// The single output of a successfully converted batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedBatch {
    /// Id of the governing data product
    pub data_product_id: String,
    /// Number of rows in the blob
    pub row_count: usize,
    /// The finished Parquet file
    pub blob: Vec<u8>,
}

/// Converts batches of messages into Parquet files.
///
/// The definition is resolved and compiled once per batch, so catalog edits
/// take effect at the next batch boundary.
pub struct BatchConversionEngine {
    catalog: CatalogStore,
    config: EngineConfig,
}

impl BatchConversionEngine {
    /// Creates a new engine.
    ///
    /// # Errors
    ///
    /// Returns [`ColumnarError::Configuration`] if the configuration is invalid.
    pub fn new(catalog: CatalogStore, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Initializing batch conversion engine for data product {} (catalog: {})",
            config.data_product_id,
            catalog.base_dir().display()
        );
        Ok(Self { catalog, config })
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Converts one batch.
    ///
    /// Returns `None` for an empty batch, and for a bulk batch whose messages
    /// hold no rows, so no zero-row file is ever produced. Otherwise every row
    /// must convert; the first failure aborts the batch and nothing is produced.
    pub fn process_batch(&self, messages: &[Message]) -> Result<Option<ConvertedBatch>> {
        info!("Processing batch of {} messages", messages.len());
        if messages.is_empty() {
            return Ok(None);
        }

        let definition = self.catalog.get_by_id(&self.config.data_product_id)?;
        let schema = to_columnar_schema(&definition)?;
        let converter = RowConverter::new(&definition)?;
        let mut writer = ColumnarWriter::try_new(&schema, self.writer_options(&definition.id))?;

        let mut row_index = 0;
        for (position, message) in messages.iter().enumerate() {
            let value = message
                .decode()
                .map_err(|source| ColumnarError::Decode {
                    index: position,
                    source,
                })?;

            match self.config.input_mode {
                InputMode::Single => {
                    append_row(&converter, &mut writer, &value, row_index)?;
                    row_index += 1;
                }
                InputMode::Bulk => {
                    let DataValue::List(rows) = value.as_ref() else {
                        return Err(ColumnarError::Row {
                            index: row_index,
                            source: ConversionError::UnexpectedMessage(
                                value.type_name().to_string(),
                            ),
                        });
                    };
                    for row in rows {
                        append_row(&converter, &mut writer, row, row_index)?;
                        row_index += 1;
                    }
                }
            }
        }

        let row_count = writer.row_count();
        if row_count == 0 {
            info!("Batch of {} messages held no rows", messages.len());
            return Ok(None);
        }
        let blob = writer.finish()?;
        info!(
            "Converted {} rows for data product {} into {} bytes",
            row_count,
            definition.id,
            blob.len()
        );

        Ok(Some(ConvertedBatch {
            data_product_id: definition.id,
            row_count,
            blob,
        }))
    }

    fn writer_options(&self, data_product_id: &str) -> WriterOptions {
        let mut metadata = HashMap::from([(
            DATA_PRODUCT_ID_KEY.to_string(),
            data_product_id.to_string(),
        )]);
        if let Some(created_at) = self.config.created_at {
            metadata.insert(CREATED_AT_KEY.to_string(), created_at.to_string());
        }

        WriterOptions {
            compression: self.config.compression,
            created_by: self.config.created_by.clone(),
            metadata,
        }
    }
}

fn append_row(
    converter: &RowConverter,
    writer: &mut ColumnarWriter,
    value: &DataValue,
    index: usize,
) -> Result<()> {
    let row = converter
        .convert_value(value)
        .map_err(|source| ColumnarError::Row { index, source })?;
    debug!("Row {} converted ({} columns set)", index, row.len());
    writer.append(&row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_json_bytes() {
        let message = Message::from_json_bytes(br#"{"a": 1}"#.to_vec());
        let value = message.decode().unwrap();
        assert_eq!(
            value.as_map().unwrap().get("a"),
            Some(&DataValue::Int(1))
        );
    }

    #[test]
    fn test_decode_invalid_json() {
        assert!(Message::from_json_bytes(b"{not json".to_vec()).decode().is_err());
    }

    #[test]
    fn test_structured_message_is_borrowed() {
        let message = Message::from(DataValue::from_json(json!({"a": "b"})));
        assert!(matches!(message.decode().unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_row_message_conversion() {
        let mut row = DataRow::new();
        row.insert("a".to_string(), DataValue::Bool(true));
        let message = Message::from(row.clone());
        assert_eq!(message, Message::Structured(DataValue::Map(row)));
    }
}
