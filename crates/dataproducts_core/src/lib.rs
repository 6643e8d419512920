//! # Data Products Core
//!
//! Core data structures and types for catalog-governed data products.
//!
//! A data product is a named dataset registered in an externally maintained
//! catalog. Its definition declares every field (a *data point*) together with
//! a semantic type and an optional flag; those two facts drive both the
//! columnar schema of the output files and the validation applied to every
//! incoming row.
//!
//! ## Key Concepts
//!
//! - **DataProductDefinition**: identity, naming and the ordered list of data points
//! - **DataPoint**: one declared field with its semantic type tag and optionality
//! - **SemanticType**: the closed set of type tags a catalog may use
//!
//! ## Example
//!
//! ```rust
//! use dataproducts_core::{DataPointBuilder, DataProductBuilder, SemanticType};
//!
//! let definition = DataProductBuilder::new("75d44fdc-dffd-42ea-af06-06fa4cb6fdbd")
//!     .fqn("customers.citizens")
//!     .description("Citizen registry")
//!     .data_point(DataPointBuilder::new("citizen_id", "UUID").build())
//!     .data_point(DataPointBuilder::new("nickname", "STRING").optional(true).build())
//!     .build();
//!
//! assert_eq!(definition.data_points.len(), 2);
//! assert_eq!(
//!     definition.data_points[0].semantic_type().unwrap(),
//!     SemanticType::Uuid
//! );
//! ```

pub mod builder;
pub mod definition;
pub mod error;

pub use builder::*;
pub use definition::*;
pub use error::*;
