//! Error types for data-product definitions.

use thiserror::Error;

/// Result type for definition operations.
pub type Result<T> = std::result::Result<T, DefinitionError>;

/// Errors raised while interpreting a data-product definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// The data point declares a type tag outside the supported set
    #[error("Unsupported type '{type_name}' for data point '{field}'")]
    UnsupportedType {
        /// Data point name
        field: String,
        /// The offending type tag
        type_name: String,
    },

    /// The definition declares no data points at all
    #[error("Data product '{0}' declares no data points")]
    EmptyDefinition(String),
}

impl DefinitionError {
    /// Creates a new unsupported type error.
    pub fn unsupported_type(field: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            field: field.into(),
            type_name: type_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DefinitionError::unsupported_type("amount", "MONEY");
        assert_eq!(
            err.to_string(),
            "Unsupported type 'MONEY' for data point 'amount'"
        );
    }
}
