//! # Data Products Validator
//!
//! Validates raw input rows against a data-product definition and converts
//! each value into its physical columnar form:
//!
//! - Presence rules (required vs optional data points)
//! - Strict shape checks per semantic type
//! - Conversion (UUID as string bytes, epoch milliseconds, day counts,
//!   fixed-scale decimal coefficients, embedded JSON documents)
//!
//! ## Example
//!
//! ```rust
//! use dataproducts_core::{DataPointBuilder, DataProductBuilder};
//! use dataproducts_validator::{ConversionError, DataRow, DataValue, RowConverter};
//!
//! let definition = DataProductBuilder::new("citizens")
//!     .data_point(DataPointBuilder::new("citizen_id", "UUID").build())
//!     .build();
//! let converter = RowConverter::new(&definition).unwrap();
//!
//! let mut row = DataRow::new();
//! row.insert("random".to_string(), DataValue::from("asdf"));
//!
//! let err = converter.convert(&row).unwrap_err();
//! assert_eq!(err, ConversionError::MissingRequiredField("citizen_id".to_string()));
//! ```

mod convert;
mod error;
mod value;

pub use convert::*;
pub use error::*;
pub use value::*;
