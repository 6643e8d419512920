//! Error types for row conversion.

use dataproducts_core::DefinitionError;
use thiserror::Error;

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;

/// Errors that can occur while validating and converting a row.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConversionError {
    /// The value's shape does not fit the declared semantic type
    #[error("Invalid value {value} for data point '{field}': expected {target}")]
    Validation {
        /// Data point name
        field: String,
        /// Rendering of the offending raw value
        value: String,
        /// Semantic type tag the value was checked against
        target: String,
    },

    /// A required data point is absent or null
    #[error("Missing required data point '{0}'")]
    MissingRequiredField(String),

    /// An ARRAY/OBJECT data point does not hold an embedded JSON document
    #[error("Nested data point '{0}' should hold a JSON document")]
    NestedType(String),

    /// The message is not an attribute map
    #[error("Unexpected message type: {0}")]
    UnexpectedMessage(String),

    /// The governing definition could not be interpreted
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

impl ConversionError {
    /// Creates a new validation error.
    pub fn validation(
        field: impl Into<String>,
        value: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            value: value.into(),
            target: target.into(),
        }
    }

    /// Creates a new missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingRequiredField(field.into())
    }

    /// Name of the data point the error is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            Self::MissingRequiredField(field) | Self::NestedType(field) => Some(field),
            Self::Definition(DefinitionError::UnsupportedType { field, .. }) => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConversionError::validation("citizen_id", "\"asdf\"", "UUID");
        assert_eq!(
            err.to_string(),
            "Invalid value \"asdf\" for data point 'citizen_id': expected UUID"
        );
        assert_eq!(err.field(), Some("citizen_id"));
    }

    #[test]
    fn test_missing_field_display() {
        let err = ConversionError::missing_field("citizen_id");
        assert_eq!(err.to_string(), "Missing required data point 'citizen_id'");
    }

    #[test]
    fn test_definition_error_is_transparent() {
        let err: ConversionError = DefinitionError::unsupported_type("amount", "MONEY").into();
        assert_eq!(
            err.to_string(),
            "Unsupported type 'MONEY' for data point 'amount'"
        );
        assert_eq!(err.field(), Some("amount"));
    }
}
