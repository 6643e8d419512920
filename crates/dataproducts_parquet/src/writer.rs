//! In-memory Parquet writer for converted rows.

use crate::config::{CompressionCodec, DEFAULT_CREATED_BY};
use crate::schema::{ColumnSchema, ColumnarSchema};
use crate::{ColumnarError, Result};
use arrow_array::builder::{
    BinaryBuilder, BooleanBuilder, Date32Builder, Decimal128Builder, Float32Builder,
    Float64Builder, Int32Builder, Int64Builder, StringBuilder, TimestampMillisecondBuilder,
};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::SchemaRef;
use dataproducts_core::SemanticType;
use dataproducts_validator::{ConvertedRow, ConvertedValue};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_writer::ArrowWriterOptions;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Options for a [`ColumnarWriter`].
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Output compression
    pub compression: CompressionCodec,
    /// Writer identification recorded in the file footer
    pub created_by: String,
    /// Extra key/value pairs recorded in the schema metadata
    pub metadata: HashMap<String, String>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: CompressionCodec::default(),
            created_by: DEFAULT_CREATED_BY.to_string(),
            metadata: HashMap::new(),
        }
    }
}

/// Accumulates converted rows and encodes them as a single Parquet file.
///
/// Rows are buffered in Arrow builders, one per column, and encoded on
/// [`finish`](Self::finish) into one row group.
pub struct ColumnarWriter {
    schema: SchemaRef,
    root: String,
    columns: Vec<(ColumnSchema, ColumnBuilder)>,
    properties: WriterProperties,
    rows: usize,
}

impl ColumnarWriter {
    /// Creates a writer for the given schema.
    pub fn try_new(schema: &ColumnarSchema, options: WriterOptions) -> Result<Self> {
        let arrow_schema = schema.to_arrow_schema().with_metadata(options.metadata);

        let columns = schema
            .columns()
            .iter()
            .map(|column| -> Result<(ColumnSchema, ColumnBuilder)> {
                Ok((column.clone(), ColumnBuilder::for_column(column)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let properties = WriterProperties::builder()
            .set_compression(options.compression.to_parquet())
            .set_created_by(options.created_by)
            .build();

        Ok(Self {
            schema: Arc::new(arrow_schema),
            root: schema.root_name().to_string(),
            columns,
            properties,
            rows: 0,
        })
    }

    /// Number of rows appended so far.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Appends one converted row; columns without a value are written as null.
    ///
    /// The row is checked against every column before anything is buffered,
    /// so a rejected row leaves the writer unchanged.
    pub fn append(&mut self, row: &ConvertedRow) -> Result<()> {
        for (column, builder) in &self.columns {
            match row.get(&column.name) {
                None if !column.nullable => {
                    return Err(ColumnarError::NullInRequiredColumn(column.name.clone()));
                }
                Some(value) if !builder.accepts(value) => {
                    return Err(ColumnarError::ColumnMismatch {
                        column: column.name.clone(),
                        expected: column.semantic.to_string(),
                        found: value_kind(value).to_string(),
                    });
                }
                _ => {}
            }
        }

        for (column, builder) in &mut self.columns {
            builder.append(row.get(&column.name));
        }
        self.rows += 1;
        Ok(())
    }

    /// Encodes every buffered row and returns the finished file.
    pub fn finish(self) -> Result<Vec<u8>> {
        let arrays: Vec<ArrayRef> = self
            .columns
            .into_iter()
            .map(|(_, builder)| builder.finish())
            .collect();
        let batch = RecordBatch::try_new(Arc::clone(&self.schema), arrays)?;

        let options = ArrowWriterOptions::new()
            .with_properties(self.properties)
            .with_schema_root(self.root);
        let mut writer =
            ArrowWriter::try_new_with_options(Vec::new(), Arc::clone(&self.schema), options)?;
        writer.write(&batch)?;
        let blob = writer.into_inner()?;

        debug!("Encoded {} rows into {} bytes", self.rows, blob.len());
        Ok(blob)
    }
}

fn value_kind(value: &ConvertedValue) -> &'static str {
    match value {
        ConvertedValue::Boolean(_) => "boolean",
        ConvertedValue::Int32(_) => "int32",
        ConvertedValue::Int64(_) => "int64",
        ConvertedValue::Float(_) => "float",
        ConvertedValue::Double(_) => "double",
        ConvertedValue::ByteArray(_) => "byte array",
        ConvertedValue::TimestampMillis(_) => "timestamp",
        ConvertedValue::Date(_) => "date",
        ConvertedValue::Decimal(_) => "decimal",
        ConvertedValue::Json(_) => "json",
    }
}

enum ColumnBuilder {
    Boolean(BooleanBuilder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
    Binary(BinaryBuilder),
    Timestamp(TimestampMillisecondBuilder),
    Date(Date32Builder),
    Decimal(Decimal128Builder),
}

impl ColumnBuilder {
    fn for_column(column: &ColumnSchema) -> Result<Self> {
        Ok(match column.semantic {
            SemanticType::Boolean => ColumnBuilder::Boolean(BooleanBuilder::new()),
            SemanticType::Int32 => ColumnBuilder::Int32(Int32Builder::new()),
            SemanticType::Int64 => ColumnBuilder::Int64(Int64Builder::new()),
            SemanticType::Float => ColumnBuilder::Float32(Float32Builder::new()),
            SemanticType::Double => ColumnBuilder::Float64(Float64Builder::new()),
            SemanticType::Uuid
            | SemanticType::String
            | SemanticType::Array
            | SemanticType::Object => ColumnBuilder::Utf8(StringBuilder::new()),
            SemanticType::ByteArray => ColumnBuilder::Binary(BinaryBuilder::new()),
            SemanticType::Timestamp => {
                ColumnBuilder::Timestamp(TimestampMillisecondBuilder::new().with_timezone("UTC"))
            }
            SemanticType::Date => ColumnBuilder::Date(Date32Builder::new()),
            SemanticType::Decimal => ColumnBuilder::Decimal(
                Decimal128Builder::new().with_precision_and_scale(
                    SemanticType::DECIMAL_PRECISION,
                    SemanticType::DECIMAL_SCALE,
                )?,
            ),
        })
    }

    fn accepts(&self, value: &ConvertedValue) -> bool {
        match (self, value) {
            (ColumnBuilder::Utf8(_), ConvertedValue::ByteArray(bytes)) => {
                std::str::from_utf8(bytes).is_ok()
            }
            (ColumnBuilder::Boolean(_), ConvertedValue::Boolean(_))
            | (ColumnBuilder::Int32(_), ConvertedValue::Int32(_))
            | (ColumnBuilder::Int64(_), ConvertedValue::Int64(_))
            | (ColumnBuilder::Float32(_), ConvertedValue::Float(_))
            | (ColumnBuilder::Float64(_), ConvertedValue::Double(_))
            | (ColumnBuilder::Utf8(_), ConvertedValue::Json(_))
            | (ColumnBuilder::Binary(_), ConvertedValue::ByteArray(_))
            | (ColumnBuilder::Timestamp(_), ConvertedValue::TimestampMillis(_))
            | (ColumnBuilder::Date(_), ConvertedValue::Date(_))
            | (ColumnBuilder::Decimal(_), ConvertedValue::Decimal(_)) => true,
            _ => false,
        }
    }

    /// Appends a value already checked with [`accepts`](Self::accepts).
    fn append(&mut self, value: Option<&ConvertedValue>) {
        match (self, value) {
            (ColumnBuilder::Boolean(b), Some(ConvertedValue::Boolean(v))) => b.append_value(*v),
            (ColumnBuilder::Int32(b), Some(ConvertedValue::Int32(v))) => b.append_value(*v),
            (ColumnBuilder::Int64(b), Some(ConvertedValue::Int64(v))) => b.append_value(*v),
            (ColumnBuilder::Float32(b), Some(ConvertedValue::Float(v))) => b.append_value(*v),
            (ColumnBuilder::Float64(b), Some(ConvertedValue::Double(v))) => b.append_value(*v),
            (ColumnBuilder::Utf8(b), Some(ConvertedValue::Json(v))) => b.append_value(v),
            (ColumnBuilder::Utf8(b), Some(ConvertedValue::ByteArray(v))) => {
                match std::str::from_utf8(v) {
                    Ok(s) => b.append_value(s),
                    Err(_) => b.append_null(),
                }
            }
            (ColumnBuilder::Binary(b), Some(ConvertedValue::ByteArray(v))) => b.append_value(v),
            (ColumnBuilder::Timestamp(b), Some(ConvertedValue::TimestampMillis(v))) => {
                b.append_value(*v)
            }
            (ColumnBuilder::Date(b), Some(ConvertedValue::Date(v))) => b.append_value(*v),
            (ColumnBuilder::Decimal(b), Some(ConvertedValue::Decimal(v))) => {
                b.append_value(i128::from(*v))
            }
            (builder, _) => builder.append_null(),
        }
    }

    fn append_null(&mut self) {
        match self {
            ColumnBuilder::Boolean(b) => b.append_null(),
            ColumnBuilder::Int32(b) => b.append_null(),
            ColumnBuilder::Int64(b) => b.append_null(),
            ColumnBuilder::Float32(b) => b.append_null(),
            ColumnBuilder::Float64(b) => b.append_null(),
            ColumnBuilder::Utf8(b) => b.append_null(),
            ColumnBuilder::Binary(b) => b.append_null(),
            ColumnBuilder::Timestamp(b) => b.append_null(),
            ColumnBuilder::Date(b) => b.append_null(),
            ColumnBuilder::Decimal(b) => b.append_null(),
        }
    }

    fn finish(self) -> ArrayRef {
        match self {
            ColumnBuilder::Boolean(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Int32(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Int64(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Float32(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Float64(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Binary(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Timestamp(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Date(mut b) => Arc::new(b.finish()),
            ColumnBuilder::Decimal(mut b) => Arc::new(b.finish()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::to_columnar_schema;
    use arrow_array::Array;
    use arrow_array::cast::AsArray;
    use arrow_array::types::{Date32Type, Decimal128Type, Int64Type, TimestampMillisecondType};
    use bytes::Bytes;
    use dataproducts_core::{DataPointBuilder, DataProductBuilder};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use parquet::basic::Compression;
    use pretty_assertions::assert_eq;

    fn ledger_schema() -> ColumnarSchema {
        let definition = DataProductBuilder::new("ledger")
            .data_point(DataPointBuilder::new("entry_id", "INT64").build())
            .data_point(DataPointBuilder::new("booked_at", "TIMESTAMP").build())
            .data_point(DataPointBuilder::new("value_date", "DATE").optional(true).build())
            .data_point(DataPointBuilder::new("amount", "DECIMAL").optional(true).build())
            .data_point(DataPointBuilder::new("memo", "STRING").optional(true).build())
            .build();
        to_columnar_schema(&definition).unwrap()
    }

    fn row(entries: Vec<(&str, ConvertedValue)>) -> ConvertedRow {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_round_trip_with_nulls() {
        let mut writer = ColumnarWriter::try_new(&ledger_schema(), WriterOptions::default()).unwrap();
        writer
            .append(&row(vec![
                ("entry_id", ConvertedValue::Int64(1)),
                ("booked_at", ConvertedValue::TimestampMillis(86_400_000)),
                ("value_date", ConvertedValue::Date(1)),
                ("amount", ConvertedValue::Decimal(1234)),
                ("memo", ConvertedValue::ByteArray(b"first".to_vec())),
            ]))
            .unwrap();
        writer
            .append(&row(vec![
                ("entry_id", ConvertedValue::Int64(2)),
                ("booked_at", ConvertedValue::TimestampMillis(0)),
            ]))
            .unwrap();
        assert_eq!(writer.row_count(), 2);

        let blob = writer.finish().unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(blob))
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);

        let ids = batch.column_by_name("entry_id").unwrap().as_primitive::<Int64Type>();
        assert_eq!(ids.values().to_vec(), vec![1, 2]);

        let booked = batch
            .column_by_name("booked_at")
            .unwrap()
            .as_primitive::<TimestampMillisecondType>();
        assert_eq!(booked.value(0), 86_400_000);

        let dates = batch.column_by_name("value_date").unwrap().as_primitive::<Date32Type>();
        assert_eq!(dates.value(0), 1);
        assert!(dates.is_null(1));

        let amounts = batch.column_by_name("amount").unwrap().as_primitive::<Decimal128Type>();
        assert_eq!(amounts.value(0), 1234);
        assert_eq!(amounts.value_as_string(0), "12.34");
        assert!(amounts.is_null(1));

        let memos = batch.column_by_name("memo").unwrap().as_string::<i32>();
        assert_eq!(memos.value(0), "first");
        assert!(memos.is_null(1));
    }

    #[test]
    fn test_required_column_without_value_is_rejected() {
        let mut writer = ColumnarWriter::try_new(&ledger_schema(), WriterOptions::default()).unwrap();
        let err = writer
            .append(&row(vec![("entry_id", ConvertedValue::Int64(1))]))
            .unwrap_err();

        assert!(matches!(err, ColumnarError::NullInRequiredColumn(ref c) if c == "booked_at"));
        assert_eq!(writer.row_count(), 0);
    }

    #[test]
    fn test_mismatched_value_is_rejected() {
        let mut writer = ColumnarWriter::try_new(&ledger_schema(), WriterOptions::default()).unwrap();
        let err = writer
            .append(&row(vec![
                ("entry_id", ConvertedValue::Int32(1)),
                ("booked_at", ConvertedValue::TimestampMillis(0)),
            ]))
            .unwrap_err();

        match err {
            ColumnarError::ColumnMismatch {
                column,
                expected,
                found,
            } => {
                assert_eq!(column, "entry_id");
                assert_eq!(expected, "INT64");
                assert_eq!(found, "int32");
            }
            other => panic!("expected column mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_footer_carries_root_name_compression_and_metadata() {
        let options = WriterOptions {
            metadata: HashMap::from([("data_product_id".to_string(), "ledger".to_string())]),
            created_by: "ledger-test".to_string(),
            ..WriterOptions::default()
        };
        let mut writer = ColumnarWriter::try_new(&ledger_schema(), options).unwrap();
        writer
            .append(&row(vec![
                ("entry_id", ConvertedValue::Int64(7)),
                ("booked_at", ConvertedValue::TimestampMillis(0)),
            ]))
            .unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(writer.finish().unwrap()))
            .unwrap();
        let file_metadata = builder.metadata().file_metadata();
        assert_eq!(file_metadata.schema_descr().root_schema().name(), "ledger");
        assert_eq!(file_metadata.created_by(), Some("ledger-test"));
        assert_eq!(
            builder.schema().metadata().get("data_product_id").map(String::as_str),
            Some("ledger")
        );

        let row_group = builder.metadata().row_group(0);
        for column in row_group.columns() {
            assert_eq!(column.compression(), Compression::SNAPPY);
        }
    }

    #[test]
    fn test_nested_columns_carry_json_annotation() {
        let definition = DataProductBuilder::new("events")
            .data_point(DataPointBuilder::new("payload", "OBJECT").build())
            .data_point(DataPointBuilder::new("labels", "ARRAY").optional(true).build())
            .data_point(DataPointBuilder::new("name", "STRING").optional(true).build())
            .build();
        let mut writer = ColumnarWriter::try_new(
            &to_columnar_schema(&definition).unwrap(),
            WriterOptions::default(),
        )
        .unwrap();
        writer
            .append(&row(vec![
                ("payload", ConvertedValue::Json(r#"{"a":1}"#.to_string())),
                ("labels", ConvertedValue::Json(r#"["x"]"#.to_string())),
            ]))
            .unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(writer.finish().unwrap()))
            .unwrap();
        let descr = builder.metadata().file_metadata().schema_descr();
        let logical = |name: &str| {
            (0..descr.num_columns())
                .map(|i| descr.column(i))
                .find(|c| c.name() == name)
                .and_then(|c| c.logical_type())
        };

        assert_eq!(logical("payload"), Some(parquet::basic::LogicalType::Json));
        assert_eq!(logical("labels"), Some(parquet::basic::LogicalType::Json));
        assert_eq!(logical("name"), Some(parquet::basic::LogicalType::String));
    }

    #[test]
    fn test_decimal_and_timestamp_physical_types() {
        let mut writer = ColumnarWriter::try_new(&ledger_schema(), WriterOptions::default()).unwrap();
        writer
            .append(&row(vec![
                ("entry_id", ConvertedValue::Int64(1)),
                ("booked_at", ConvertedValue::TimestampMillis(0)),
            ]))
            .unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(writer.finish().unwrap()))
            .unwrap();
        let descr = builder.metadata().file_metadata().schema_descr();
        let physical = |name: &str| {
            (0..descr.num_columns())
                .map(|i| descr.column(i))
                .find(|c| c.name() == name)
                .map(|c| c.physical_type())
                .unwrap()
        };

        assert_eq!(physical("amount"), parquet::basic::Type::INT64);
        assert_eq!(physical("booked_at"), parquet::basic::Type::INT64);
        assert_eq!(physical("value_date"), parquet::basic::Type::INT32);
        assert_eq!(physical("memo"), parquet::basic::Type::BYTE_ARRAY);
    }
}
