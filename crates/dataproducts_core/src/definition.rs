//! Data-product definition types.
//!
//! These types mirror the catalog's YAML documents. A catalog file wraps one
//! [`DataProductDefinition`] under a top-level `definition` key:
//!
//! ```yaml
//! definition:
//!   id: 75d44fdc-dffd-42ea-af06-06fa4cb6fdbd
//!   fqn: customers.citizens
//!   description: Citizen registry
//!   uniqueKey: [citizen_id]
//!   dataPoints:
//!     - name: citizen_id
//!       type: UUID
//! ```

use crate::{DefinitionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One catalog document as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionDocument {
    /// The wrapped data-product definition
    pub definition: DataProductDefinition,
}

/// A data-product definition governing the schema of one dataset.
///
/// Identity is the declared `id`; two definitions with the same id describe
/// the same data product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProductDefinition {
    /// Unique identifier the catalog is keyed by
    pub id: String,

    /// Fully-qualified name (e.g. "customers.citizens")
    #[serde(default)]
    pub fqn: String,

    /// Human-readable description of the dataset
    #[serde(default)]
    pub description: String,

    /// Ordered list of columns forming the unique key
    #[serde(default)]
    pub unique_key: Vec<String>,

    /// Ordered list of declared fields
    #[serde(default)]
    pub data_points: Vec<DataPoint>,
}

impl DataProductDefinition {
    /// Looks up a data point by name.
    pub fn data_point(&self, name: &str) -> Option<&DataPoint> {
        self.data_points.iter().find(|dp| dp.name == name)
    }
}

/// A single declared field of a data product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Field name, also used as the output column name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Semantic type tag (e.g. "UUID", "DECIMAL")
    #[serde(rename = "type")]
    pub data_type: String,

    /// Whether the field may be absent or null
    #[serde(default)]
    pub optional: bool,

    /// Names of data points this one is derived from
    #[serde(default)]
    pub depends: Vec<String>,

    /// Free-form tags for categorization
    #[serde(default)]
    pub tags: Vec<String>,

    /// Downstream egress metadata; carried through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress: Option<serde_json::Value>,
}

impl DataPoint {
    /// Resolves the declared type tag into a [`SemanticType`].
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::UnsupportedType`] when the tag is not one of
    /// the supported semantic types.
    pub fn semantic_type(&self) -> Result<SemanticType> {
        self.data_type
            .parse::<SemanticType>()
            .map_err(|_| DefinitionError::unsupported_type(&self.name, &self.data_type))
    }
}

/// The closed set of semantic type tags a catalog may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    /// `BOOLEAN`
    Boolean,
    /// `INT64`
    Int64,
    /// `INT32`, also spelled `INT`
    Int32,
    /// `FLOAT` (32-bit)
    Float,
    /// `DOUBLE` (64-bit)
    Double,
    /// `UUID`, written as its string form
    Uuid,
    /// `STRING`
    String,
    /// `TIMESTAMP`, millisecond precision in UTC
    Timestamp,
    /// `DATE`, days since the epoch
    Date,
    /// `DECIMAL`, fixed precision and scale
    Decimal,
    /// `BYTE_ARRAY`
    ByteArray,
    /// `ARRAY`, an embedded JSON array
    Array,
    /// `OBJECT`, an embedded JSON object
    Object,
}

impl SemanticType {
    /// Precision of every `DECIMAL` column.
    pub const DECIMAL_PRECISION: u8 = 18;

    /// Scale of every `DECIMAL` column.
    pub const DECIMAL_SCALE: i8 = 2;

    /// Returns the canonical catalog tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Boolean => "BOOLEAN",
            SemanticType::Int64 => "INT64",
            SemanticType::Int32 => "INT32",
            SemanticType::Float => "FLOAT",
            SemanticType::Double => "DOUBLE",
            SemanticType::Uuid => "UUID",
            SemanticType::String => "STRING",
            SemanticType::Timestamp => "TIMESTAMP",
            SemanticType::Date => "DATE",
            SemanticType::Decimal => "DECIMAL",
            SemanticType::ByteArray => "BYTE_ARRAY",
            SemanticType::Array => "ARRAY",
            SemanticType::Object => "OBJECT",
        }
    }

    /// Returns true for types whose values arrive as embedded JSON documents.
    pub fn is_nested(&self) -> bool {
        matches!(self, SemanticType::Array | SemanticType::Object)
    }
}

impl FromStr for SemanticType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "BOOLEAN" => Ok(SemanticType::Boolean),
            "INT64" => Ok(SemanticType::Int64),
            "INT32" | "INT" => Ok(SemanticType::Int32),
            "FLOAT" => Ok(SemanticType::Float),
            "DOUBLE" => Ok(SemanticType::Double),
            "UUID" => Ok(SemanticType::Uuid),
            "STRING" => Ok(SemanticType::String),
            "TIMESTAMP" => Ok(SemanticType::Timestamp),
            "DATE" => Ok(SemanticType::Date),
            "DECIMAL" => Ok(SemanticType::Decimal),
            "BYTE_ARRAY" => Ok(SemanticType::ByteArray),
            "ARRAY" => Ok(SemanticType::Array),
            "OBJECT" => Ok(SemanticType::Object),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
