//! Dynamically typed input values.
//!
//! Rows reach the converter as attribute maps whose values carry their own
//! runtime type, whether they were decoded from JSON or read from a database.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::fmt;

/// A value in an input row.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Null/missing value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Point in time, normalized to UTC
    Timestamp(DateTime<Utc>),
    /// List/array value
    List(Vec<DataValue>),
    /// Map/struct value
    Map(HashMap<String, DataValue>),
}

/// A single input row: field name to raw value.
pub type DataRow = HashMap<String, DataValue>;

impl DataValue {
    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Bool(_) => "boolean",
            DataValue::Int(_) => "int64",
            DataValue::Float(_) => "float64",
            DataValue::String(_) => "string",
            DataValue::Timestamp(_) => "timestamp",
            DataValue::List(_) => "list",
            DataValue::Map(_) => "map",
        }
    }

    /// Attempts to get this value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to get this value as an attribute map.
    pub fn as_map(&self) -> Option<&HashMap<String, DataValue>> {
        match self {
            DataValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Converts a decoded JSON document.
    ///
    /// Integral numbers that fit in an `i64` become [`DataValue::Int`]; every
    /// other number becomes [`DataValue::Float`]. JSON has no timestamp type,
    /// so timestamps only arrive through structured sources.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => DataValue::Null,
            serde_json::Value::Bool(b) => DataValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => DataValue::Int(i),
                None => n.as_f64().map_or(DataValue::Null, DataValue::Float),
            },
            serde_json::Value::String(s) => DataValue::String(s),
            serde_json::Value::Array(items) => {
                DataValue::List(items.into_iter().map(DataValue::from_json).collect())
            }
            serde_json::Value::Object(fields) => DataValue::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, DataValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Renders this value as JSON; timestamps become RFC 3339 strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            DataValue::Null => serde_json::Value::Null,
            DataValue::Bool(b) => serde_json::Value::Bool(*b),
            DataValue::Int(i) => serde_json::Value::from(*i),
            DataValue::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            DataValue::String(s) => serde_json::Value::String(s.clone()),
            DataValue::Timestamp(ts) => {
                serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            DataValue::List(items) => {
                serde_json::Value::Array(items.iter().map(DataValue::to_json).collect())
            }
            DataValue::Map(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::String(s)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(i: i64) -> Self {
        DataValue::Int(i)
    }
}

impl From<f64> for DataValue {
    fn from(f: f64) -> Self {
        DataValue::Float(f)
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        DataValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(ts: DateTime<Utc>) -> Self {
        DataValue::Timestamp(ts)
    }
}

impl From<serde_json::Value> for DataValue {
    fn from(value: serde_json::Value) -> Self {
        DataValue::from_json(value)
    }
}
