//! Catalog loader for data-product definitions.
//!
//! This crate parses YAML definition documents into the strongly-typed
//! [`DataProductDefinition`] and provides [`CatalogStore`], which resolves
//! definitions by id from a directory tree.
//!
//! # Example
//!
//! ```rust
//! use dataproducts_parser::parse_yaml;
//!
//! let yaml = r#"
//! definition:
//!   id: 75d44fdc-dffd-42ea-af06-06fa4cb6fdbd
//!   fqn: customers.citizens
//!   dataPoints:
//!     - name: citizen_id
//!       type: UUID
//! "#;
//!
//! let definition = parse_yaml(yaml).expect("Failed to parse definition");
//! assert_eq!(definition.fqn, "customers.citizens");
//! ```

mod store;

use dataproducts_core::{DataProductDefinition, DefinitionDocument};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use store::{CatalogIndex, CatalogStore, DuplicatePolicy};

/// Errors that can occur while loading the catalog.
#[derive(Debug, Error)]
pub enum ParserError {
    /// YAML parsing or deserialization failed
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    /// A catalog file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Offending file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A catalog file could not be parsed
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        /// Offending file
        path: PathBuf,
        /// Underlying YAML error
        source: serde_yaml_ng::Error,
    },

    /// No definition carries the requested id
    #[error("Data product definition not found: {0}")]
    NotFound(String),

    /// Two catalog files declare the same id
    #[error("Duplicate data product id '{id}' in {} and {}", first.display(), second.display())]
    DuplicateId {
        /// The duplicated id
        id: String,
        /// File that declared it first
        first: PathBuf,
        /// File that declared it again
        second: PathBuf,
    },

    /// Unsupported file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid file extension
    #[error("Invalid or missing file extension")]
    InvalidExtension,
}

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

/// Supported definition file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionFormat {
    /// YAML format (.yaml)
    Yaml,
}

/// Parse a definition from a YAML document.
///
/// The document must wrap the definition under a top-level `definition` key.
pub fn parse_yaml(content: &str) -> Result<DataProductDefinition> {
    let document: DefinitionDocument = serde_yaml_ng::from_str(content)?;
    Ok(document.definition)
}

/// Detect the definition format from a file path based on its extension.
///
/// # Supported Extensions
///
/// * `.yaml` → `DefinitionFormat::Yaml`
///
/// The match is exact: `.yml` and `.YAML` files are not catalog documents.
///
/// # Errors
///
/// Returns `ParserError::InvalidExtension` if the file has no extension.
/// Returns `ParserError::UnsupportedFormat` if the extension is not recognized.
pub fn detect_format(path: &Path) -> Result<DefinitionFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or(ParserError::InvalidExtension)?;

    match extension {
        "yaml" => Ok(DefinitionFormat::Yaml),
        other => Err(ParserError::UnsupportedFormat(other.to_string())),
    }
}

/// Parse a definition from a file.
///
/// Unlike [`parse_yaml`], failures carry the offending path.
///
/// # Example
///
/// ```no_run
/// use dataproducts_parser::parse_file;
/// use std::path::Path;
///
/// let definition = parse_file(Path::new("catalog/customers/citizens.yaml")).unwrap();
/// println!("Loaded definition: {}", definition.id);
/// ```
pub fn parse_file(path: &Path) -> Result<DataProductDefinition> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| ParserError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let document: DefinitionDocument = match format {
        DefinitionFormat::Yaml => {
            serde_yaml_ng::from_str(&content).map_err(|source| ParserError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
    };

    Ok(document.definition)
}
