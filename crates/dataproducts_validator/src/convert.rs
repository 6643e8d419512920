//! Row validation and conversion.
//!
//! [`RowConverter`] walks a definition's data points in declaration order and
//! turns one raw [`DataRow`] into a sparse [`ConvertedRow`] whose values are
//! already in their physical columnar form. The first failing data point
//! aborts the row.

use crate::{ConversionError, DataRow, DataValue, Result};
use chrono::{DateTime, Utc};
use dataproducts_core::{DataProductDefinition, SemanticType};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

const SECONDS_PER_DAY: i64 = 86_400;

/// Largest absolute DECIMAL coefficient that fits precision 18.
const MAX_DECIMAL_COEFFICIENT: u64 = 999_999_999_999_999_999;

static DECIMAL_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+\.\d{2}$").expect("decimal pattern is valid"));

/// A value converted to its physical columnar representation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertedValue {
    /// BOOLEAN
    Boolean(bool),
    /// INT32 / INT
    Int32(i32),
    /// INT64
    Int64(i64),
    /// FLOAT
    Float(f32),
    /// DOUBLE
    Double(f64),
    /// UUID, STRING and BYTE_ARRAY, as raw bytes
    ByteArray(Vec<u8>),
    /// TIMESTAMP, milliseconds since the epoch in UTC
    TimestampMillis(i64),
    /// DATE, days since the epoch
    Date(i32),
    /// DECIMAL, the unscaled coefficient at scale 2
    Decimal(i64),
    /// ARRAY / OBJECT, compact JSON text
    Json(String),
}

/// A converted row: column name to converted value.
///
/// Optional data points that were absent or null have no entry.
pub type ConvertedRow = HashMap<String, ConvertedValue>;

#[derive(Debug, Clone)]
struct FieldRule {
    name: String,
    semantic: SemanticType,
    optional: bool,
}

/// Validates and converts rows against one data-product definition.
///
/// # Example
///
/// ```rust
/// use dataproducts_core::{DataPointBuilder, DataProductBuilder};
/// use dataproducts_validator::{ConvertedValue, DataRow, DataValue, RowConverter};
///
/// let definition = DataProductBuilder::new("citizens")
///     .data_point(DataPointBuilder::new("citizen_id", "UUID").build())
///     .build();
/// let converter = RowConverter::new(&definition).unwrap();
///
/// let mut row = DataRow::new();
/// row.insert(
///     "citizen_id".to_string(),
///     DataValue::from("75d44fdc-dffd-42ea-af06-06fa4cb6fdbd"),
/// );
///
/// let converted = converter.convert(&row).unwrap();
/// assert_eq!(
///     converted["citizen_id"],
///     ConvertedValue::ByteArray(b"75d44fdc-dffd-42ea-af06-06fa4cb6fdbd".to_vec())
/// );
/// ```
#[derive(Debug, Clone)]
pub struct RowConverter {
    rules: Vec<FieldRule>,
}

impl RowConverter {
    /// Resolves every data point's semantic type up front.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::Definition`] if any data point declares an
    /// unsupported type tag.
    pub fn new(definition: &DataProductDefinition) -> Result<Self> {
        let rules = definition
            .data_points
            .iter()
            .map(|dp| -> Result<FieldRule> {
                Ok(FieldRule {
                    name: dp.name.clone(),
                    semantic: dp.semantic_type()?,
                    optional: dp.optional,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Number of data points this converter checks.
    pub fn field_count(&self) -> usize {
        self.rules.len()
    }

    /// Converts one raw row. Fields not declared by the definition are ignored.
    pub fn convert(&self, row: &DataRow) -> Result<ConvertedRow> {
        let mut converted = ConvertedRow::with_capacity(self.rules.len());

        for rule in &self.rules {
            let value = match row.get(&rule.name) {
                Some(value) if !value.is_null() => value,
                _ if rule.optional => continue,
                _ => return Err(ConversionError::missing_field(&rule.name)),
            };

            let out = validate_and_convert(&rule.name, rule.semantic, value)?;
            converted.insert(rule.name.clone(), out);
        }

        Ok(converted)
    }

    /// Converts a message that must be an attribute map.
    pub fn convert_value(&self, message: &DataValue) -> Result<ConvertedRow> {
        match message {
            DataValue::Map(row) => self.convert(row),
            other => Err(ConversionError::UnexpectedMessage(
                other.type_name().to_string(),
            )),
        }
    }
}

/// Validates one non-null value against a semantic type and converts it.
pub fn validate_and_convert(
    field: &str,
    semantic: SemanticType,
    value: &DataValue,
) -> Result<ConvertedValue> {
    let mismatch = || ConversionError::validation(field, value.to_string(), semantic.as_str());

    match (semantic, value) {
        (SemanticType::Boolean, DataValue::Bool(b)) => Ok(ConvertedValue::Boolean(*b)),
        (SemanticType::Int64, DataValue::Int(i)) => Ok(ConvertedValue::Int64(*i)),
        // Out-of-range values wrap
        (SemanticType::Int32, DataValue::Int(i)) => Ok(ConvertedValue::Int32(*i as i32)),
        (SemanticType::Float, DataValue::Float(f)) => Ok(ConvertedValue::Float(*f as f32)),
        (SemanticType::Double, DataValue::Float(f)) => Ok(ConvertedValue::Double(*f)),
        (SemanticType::Uuid, DataValue::String(s)) => {
            uuid::Uuid::parse_str(s).map_err(|_| mismatch())?;
            Ok(ConvertedValue::ByteArray(s.as_bytes().to_vec()))
        }
        (SemanticType::String | SemanticType::ByteArray, DataValue::String(s)) => {
            Ok(ConvertedValue::ByteArray(s.as_bytes().to_vec()))
        }
        (SemanticType::Timestamp, DataValue::Timestamp(ts)) => {
            Ok(ConvertedValue::TimestampMillis(ts.timestamp_millis()))
        }
        (SemanticType::Date, DataValue::Timestamp(ts)) => {
            days_since_epoch(ts).map(ConvertedValue::Date).ok_or_else(mismatch)
        }
        (SemanticType::Decimal, DataValue::String(s)) => decimal_coefficient(s)
            .map(ConvertedValue::Decimal)
            .ok_or_else(mismatch),
        (SemanticType::Array | SemanticType::Object, _) => convert_nested(field, semantic, value),
        _ => Err(mismatch()),
    }
}

/// Decodes an embedded JSON document and checks its container kind.
fn convert_nested(field: &str, semantic: SemanticType, value: &DataValue) -> Result<ConvertedValue> {
    let text = value
        .as_str()
        .ok_or_else(|| ConversionError::NestedType(field.to_string()))?;
    let document: serde_json::Value =
        serde_json::from_str(text).map_err(|_| ConversionError::NestedType(field.to_string()))?;

    let kind_matches = match semantic {
        SemanticType::Array => document.is_array(),
        _ => document.is_object(),
    };
    if !kind_matches {
        return Err(ConversionError::validation(
            field,
            document.to_string(),
            semantic.as_str(),
        ));
    }

    Ok(ConvertedValue::Json(document.to_string()))
}

/// Whole days since the epoch, rounded toward negative infinity.
fn days_since_epoch(ts: &DateTime<Utc>) -> Option<i32> {
    i32::try_from(ts.timestamp().div_euclid(SECONDS_PER_DAY)).ok()
}

/// Parses a scale-2 decimal literal into its unscaled coefficient.
fn decimal_coefficient(literal: &str) -> Option<i64> {
    if !DECIMAL_LITERAL.is_match(literal) {
        return None;
    }
    let coefficient: i64 = literal.replacen('.', "", 1).parse().ok()?;
    (coefficient.unsigned_abs() <= MAX_DECIMAL_COEFFICIENT).then_some(coefficient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataproducts_core::{DataPointBuilder, DataProductBuilder};
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> DataValue {
        DataValue::Timestamp(DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc))
    }

    fn convert_one(semantic: SemanticType, value: DataValue) -> Result<ConvertedValue> {
        validate_and_convert("field", semantic, &value)
    }

    #[test]
    fn test_uuid_round_trips_as_string_bytes() {
        let id = "75d44fdc-dffd-42ea-af06-06fa4cb6fdbd";
        let out = convert_one(SemanticType::Uuid, DataValue::from(id)).unwrap();
        assert_eq!(out, ConvertedValue::ByteArray(id.as_bytes().to_vec()));
    }

    #[test]
    fn test_invalid_uuid_fails_validation() {
        let err = convert_one(SemanticType::Uuid, DataValue::from("asdf")).unwrap_err();
        assert_eq!(
            err,
            ConversionError::validation("field", "\"asdf\"", "UUID")
        );
    }

    #[test]
    fn test_decimal_scale_two() {
        assert_eq!(
            convert_one(SemanticType::Decimal, DataValue::from("12.34")).unwrap(),
            ConvertedValue::Decimal(1234)
        );
        assert_eq!(
            convert_one(SemanticType::Decimal, DataValue::from("-0.05")).unwrap(),
            ConvertedValue::Decimal(-5)
        );
        assert_eq!(
            convert_one(SemanticType::Decimal, DataValue::from("+7.00")).unwrap(),
            ConvertedValue::Decimal(700)
        );
    }

    #[test]
    fn test_decimal_other_scales_fail() {
        for literal in ["12.345", "12.3", "12", "1e3", "abc", ".12", "12.34 "] {
            let err = convert_one(SemanticType::Decimal, DataValue::from(literal)).unwrap_err();
            assert!(
                matches!(err, ConversionError::Validation { .. }),
                "literal {literal:?}"
            );
        }
    }

    #[test]
    fn test_decimal_precision_limit() {
        assert_eq!(
            convert_one(SemanticType::Decimal, DataValue::from("9999999999999999.99")).unwrap(),
            ConvertedValue::Decimal(999_999_999_999_999_999)
        );
        assert!(convert_one(SemanticType::Decimal, DataValue::from("10000000000000000.00")).is_err());
    }

    #[test]
    fn test_decimal_requires_string() {
        assert!(convert_one(SemanticType::Decimal, DataValue::Float(12.34)).is_err());
    }

    #[test]
    fn test_timestamp_and_date_from_one_day_after_epoch() {
        let value = ts("1970-01-02T00:00:00Z");
        assert_eq!(
            convert_one(SemanticType::Timestamp, value.clone()).unwrap(),
            ConvertedValue::TimestampMillis(86_400_000)
        );
        assert_eq!(
            convert_one(SemanticType::Date, value).unwrap(),
            ConvertedValue::Date(1)
        );
    }

    #[test]
    fn test_date_ignores_time_of_day_and_floors_before_epoch() {
        assert_eq!(
            convert_one(SemanticType::Date, ts("1970-01-02T23:59:59Z")).unwrap(),
            ConvertedValue::Date(1)
        );
        assert_eq!(
            convert_one(SemanticType::Date, ts("1969-12-31T12:00:00Z")).unwrap(),
            ConvertedValue::Date(-1)
        );
    }

    #[test]
    fn test_timestamp_normalizes_offset_to_utc() {
        assert_eq!(
            convert_one(SemanticType::Timestamp, ts("1970-01-01T01:00:00+01:00")).unwrap(),
            ConvertedValue::TimestampMillis(0)
        );
    }

    #[test]
    fn test_timestamp_rejects_strings() {
        assert!(convert_one(SemanticType::Timestamp, DataValue::from("1970-01-02T00:00:00Z")).is_err());
    }

    #[test]
    fn test_int32_truncates() {
        assert_eq!(
            convert_one(SemanticType::Int32, DataValue::Int(42)).unwrap(),
            ConvertedValue::Int32(42)
        );
        assert_eq!(
            convert_one(SemanticType::Int32, DataValue::Int(i64::from(i32::MAX) + 1)).unwrap(),
            ConvertedValue::Int32(i32::MIN)
        );
    }

    #[test]
    fn test_numeric_shapes_are_strict() {
        assert!(convert_one(SemanticType::Double, DataValue::Int(1)).is_err());
        assert!(convert_one(SemanticType::Int64, DataValue::Float(1.0)).is_err());
        assert!(convert_one(SemanticType::Boolean, DataValue::Int(1)).is_err());
        assert_eq!(
            convert_one(SemanticType::Float, DataValue::Float(1.5)).unwrap(),
            ConvertedValue::Float(1.5)
        );
        assert_eq!(
            convert_one(SemanticType::Double, DataValue::Float(1.5)).unwrap(),
            ConvertedValue::Double(1.5)
        );
    }

    #[test]
    fn test_nested_documents() {
        assert_eq!(
            convert_one(SemanticType::Array, DataValue::from("[1, 2, {\"a\": null}]")).unwrap(),
            ConvertedValue::Json("[1,2,{\"a\":null}]".to_string())
        );
        assert_eq!(
            convert_one(SemanticType::Object, DataValue::from("{ \"k\": \"v\" }")).unwrap(),
            ConvertedValue::Json("{\"k\":\"v\"}".to_string())
        );
    }

    #[test]
    fn test_nested_decode_failures() {
        assert_eq!(
            convert_one(SemanticType::Object, DataValue::from("{not json")).unwrap_err(),
            ConversionError::NestedType("field".to_string())
        );
        assert_eq!(
            convert_one(SemanticType::Array, DataValue::Int(3)).unwrap_err(),
            ConversionError::NestedType("field".to_string())
        );
    }

    #[test]
    fn test_nested_wrong_container_kind() {
        let err = convert_one(SemanticType::Array, DataValue::from("{\"a\": 1}")).unwrap_err();
        assert!(matches!(err, ConversionError::Validation { ref target, .. } if target == "ARRAY"));
    }

    #[test]
    fn test_row_missing_and_null_rules() {
        let definition = DataProductBuilder::new("dp")
            .data_point(DataPointBuilder::new("id", "INT64").build())
            .data_point(DataPointBuilder::new("note", "STRING").optional(true).build())
            .build();
        let converter = RowConverter::new(&definition).unwrap();

        let mut row = DataRow::new();
        row.insert("id".into(), DataValue::Int(1));
        row.insert("note".into(), DataValue::Null);
        let out = converter.convert(&row).unwrap();
        assert_eq!(out.len(), 1);
        assert!(!out.contains_key("note"));

        row.insert("id".into(), DataValue::Null);
        assert_eq!(
            converter.convert(&row).unwrap_err(),
            ConversionError::missing_field("id")
        );

        row.remove("id");
        assert_eq!(
            converter.convert(&row).unwrap_err(),
            ConversionError::missing_field("id")
        );
    }

    #[test]
    fn test_row_first_failure_wins() {
        let definition = DataProductBuilder::new("dp")
            .data_point(DataPointBuilder::new("a", "BOOLEAN").build())
            .data_point(DataPointBuilder::new("b", "INT64").build())
            .build();
        let converter = RowConverter::new(&definition).unwrap();

        let mut row = DataRow::new();
        row.insert("a".into(), DataValue::from("yes"));
        let err = converter.convert(&row).unwrap_err();
        assert_eq!(err.field(), Some("a"));
    }

    #[test]
    fn test_unknown_type_fails_converter_construction() {
        let definition = DataProductBuilder::new("dp")
            .data_point(DataPointBuilder::new("amount", "MONEY").build())
            .build();
        assert!(matches!(
            RowConverter::new(&definition).unwrap_err(),
            ConversionError::Definition(_)
        ));
    }

    #[test]
    fn test_convert_value_requires_map() {
        let definition = DataProductBuilder::new("dp").build();
        let converter = RowConverter::new(&definition).unwrap();
        assert_eq!(
            converter.convert_value(&DataValue::from("x")).unwrap_err(),
            ConversionError::UnexpectedMessage("string".to_string())
        );
        assert!(converter.convert_value(&DataValue::Map(HashMap::new())).unwrap().is_empty());
    }
}
