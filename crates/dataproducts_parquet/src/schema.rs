//! Columnar schema compilation.
//!
//! Every data point becomes exactly one column, in declaration order, and a
//! data point's `optional` flag is the column's nullability.

use arrow_schema::extension::Json;
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use dataproducts_core::{DataPoint, DataProductDefinition, DefinitionError, SemanticType};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Arrow field metadata key recording a column's semantic type tag.
pub const SEMANTIC_TYPE_KEY: &str = "dataproducts.semantic_type";

/// Physical storage type of a Parquet column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    Float,
    Double,
    ByteArray,
}

impl fmt::Display for PhysicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhysicalType::Boolean => "BOOLEAN",
            PhysicalType::Int32 => "INT32",
            PhysicalType::Int64 => "INT64",
            PhysicalType::Float => "FLOAT",
            PhysicalType::Double => "DOUBLE",
            PhysicalType::ByteArray => "BYTE_ARRAY",
        };
        f.write_str(name)
    }
}

/// Logical annotation layered over a physical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicalType {
    /// Sized integer
    Integer { bit_width: u8, signed: bool },
    /// UTF-8 text
    String,
    /// Milliseconds since the epoch
    Timestamp { adjusted_to_utc: bool },
    /// Days since the epoch
    Date,
    /// Fixed-point decimal stored as its unscaled coefficient
    Decimal { precision: u8, scale: i8 },
    /// Embedded JSON document
    Json,
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Integer { bit_width, signed } => {
                let sign = if *signed { "signed" } else { "unsigned" };
                write!(f, "INTEGER({bit_width}, {sign})")
            }
            LogicalType::String => f.write_str("STRING"),
            LogicalType::Timestamp { adjusted_to_utc } => {
                write!(f, "TIMESTAMP(MILLIS, utc={adjusted_to_utc})")
            }
            LogicalType::Date => f.write_str("DATE"),
            LogicalType::Decimal { precision, scale } => write!(f, "DECIMAL({precision}, {scale})"),
            LogicalType::Json => f.write_str("JSON"),
        }
    }
}

/// One compiled column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSchema {
    /// Column name (the data point name)
    pub name: String,
    /// Semantic type the column was compiled from
    #[serde(serialize_with = "serialize_semantic")]
    pub semantic: SemanticType,
    /// Physical storage type
    pub physical: PhysicalType,
    /// Logical annotation, if any
    pub logical: Option<LogicalType>,
    /// Whether the column may hold nulls
    pub nullable: bool,
}

fn serialize_semantic<S: serde::Serializer>(
    semantic: &SemanticType,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(semantic.as_str())
}

impl ColumnSchema {
    /// Compiles one data point.
    pub fn from_data_point(data_point: &DataPoint) -> Result<Self, DefinitionError> {
        let semantic = data_point.semantic_type()?;
        let (physical, logical) = storage_of(semantic);

        debug!(
            "Compiled column {} ({} -> {}{})",
            data_point.name,
            semantic,
            physical,
            logical.map(|l| format!(" {l}")).unwrap_or_default()
        );

        Ok(Self {
            name: data_point.name.clone(),
            semantic,
            physical,
            logical,
            nullable: data_point.optional,
        })
    }

    /// Arrow type the column is written with.
    pub fn arrow_type(&self) -> DataType {
        match self.semantic {
            SemanticType::Boolean => DataType::Boolean,
            SemanticType::Int64 => DataType::Int64,
            SemanticType::Int32 => DataType::Int32,
            SemanticType::Float => DataType::Float32,
            SemanticType::Double => DataType::Float64,
            SemanticType::Uuid
            | SemanticType::String
            | SemanticType::Array
            | SemanticType::Object => DataType::Utf8,
            SemanticType::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            SemanticType::Date => DataType::Date32,
            SemanticType::Decimal => DataType::Decimal128(
                SemanticType::DECIMAL_PRECISION,
                SemanticType::DECIMAL_SCALE,
            ),
            SemanticType::ByteArray => DataType::Binary,
        }
    }

    /// Arrow field for this column, tagged with its semantic type.
    ///
    /// JSON columns also carry the canonical `arrow.json` extension type, which
    /// the Parquet writer turns into the JSON logical annotation.
    pub fn to_arrow_field(&self) -> Field {
        let field = Field::new(&self.name, self.arrow_type(), self.nullable).with_metadata(
            HashMap::from([(
                SEMANTIC_TYPE_KEY.to_string(),
                self.semantic.as_str().to_string(),
            )]),
        );
        match self.logical {
            Some(LogicalType::Json) => field.with_extension_type(Json::default()),
            _ => field,
        }
    }
}

fn storage_of(semantic: SemanticType) -> (PhysicalType, Option<LogicalType>) {
    match semantic {
        SemanticType::Boolean => (PhysicalType::Boolean, None),
        SemanticType::Int64 => (
            PhysicalType::Int64,
            Some(LogicalType::Integer {
                bit_width: 64,
                signed: true,
            }),
        ),
        SemanticType::Int32 => (
            PhysicalType::Int32,
            Some(LogicalType::Integer {
                bit_width: 32,
                signed: true,
            }),
        ),
        SemanticType::Float => (PhysicalType::Float, None),
        SemanticType::Double => (PhysicalType::Double, None),
        SemanticType::Uuid | SemanticType::String => {
            (PhysicalType::ByteArray, Some(LogicalType::String))
        }
        SemanticType::Timestamp => (
            PhysicalType::Int64,
            Some(LogicalType::Timestamp {
                adjusted_to_utc: true,
            }),
        ),
        SemanticType::Date => (PhysicalType::Int32, Some(LogicalType::Date)),
        SemanticType::Decimal => (
            PhysicalType::Int64,
            Some(LogicalType::Decimal {
                precision: SemanticType::DECIMAL_PRECISION,
                scale: SemanticType::DECIMAL_SCALE,
            }),
        ),
        SemanticType::ByteArray => (PhysicalType::ByteArray, None),
        SemanticType::Array | SemanticType::Object => {
            (PhysicalType::ByteArray, Some(LogicalType::Json))
        }
    }
}

/// A compiled schema: the root is named after the definition id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnarSchema {
    root: String,
    columns: Vec<ColumnSchema>,
}

impl ColumnarSchema {
    /// Name of the schema root.
    pub fn root_name(&self) -> &str {
        &self.root
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Arrow schema used to build record batches.
    pub fn to_arrow_schema(&self) -> Schema {
        Schema::new(
            self.columns
                .iter()
                .map(ColumnSchema::to_arrow_field)
                .collect::<Vec<_>>(),
        )
    }
}

/// Compiles a definition into a columnar schema.
///
/// # Errors
///
/// Returns [`DefinitionError::UnsupportedType`] for the first data point with
/// an unknown type tag, and [`DefinitionError::EmptyDefinition`] when the
/// definition declares no data points.
pub fn to_columnar_schema(
    definition: &DataProductDefinition,
) -> Result<ColumnarSchema, DefinitionError> {
    if definition.data_points.is_empty() {
        return Err(DefinitionError::EmptyDefinition(definition.id.clone()));
    }

    let columns = definition
        .data_points
        .iter()
        .map(ColumnSchema::from_data_point)
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "Compiled {} columns for data product {}",
        columns.len(),
        definition.id
    );

    Ok(ColumnarSchema {
        root: definition.id.clone(),
        columns,
    })
}
