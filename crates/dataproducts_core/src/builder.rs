//! Builder pattern for creating data-product definitions.
//!
//! Catalog definitions normally come from YAML, but builders are handy for
//! tests and for hosts that assemble definitions programmatically.

use crate::{DataPoint, DataProductDefinition};

/// Builder for creating a `DataProductDefinition`.
///
/// # Example
///
/// ```rust
/// use dataproducts_core::{DataPointBuilder, DataProductBuilder};
///
/// let definition = DataProductBuilder::new("orders-v1")
///     .fqn("sales.orders")
///     .unique_key(vec!["order_id".to_string()])
///     .data_point(DataPointBuilder::new("order_id", "INT64").build())
///     .build();
///
/// assert_eq!(definition.id, "orders-v1");
/// ```
#[derive(Debug, Default)]
pub struct DataProductBuilder {
    id: String,
    fqn: String,
    description: String,
    unique_key: Vec<String>,
    data_points: Vec<DataPoint>,
}

impl DataProductBuilder {
    /// Creates a new builder for the definition with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Sets the fully-qualified name.
    pub fn fqn(mut self, fqn: impl Into<String>) -> Self {
        self.fqn = fqn.into();
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the unique key columns.
    pub fn unique_key(mut self, columns: Vec<String>) -> Self {
        self.unique_key = columns;
        self
    }

    /// Appends a data point.
    pub fn data_point(mut self, data_point: DataPoint) -> Self {
        self.data_points.push(data_point);
        self
    }

    /// Appends several data points, preserving their order.
    pub fn data_points(mut self, data_points: Vec<DataPoint>) -> Self {
        self.data_points.extend(data_points);
        self
    }

    /// Builds the definition.
    pub fn build(self) -> DataProductDefinition {
        DataProductDefinition {
            id: self.id,
            fqn: self.fqn,
            description: self.description,
            unique_key: self.unique_key,
            data_points: self.data_points,
        }
    }
}

/// Builder for creating a `DataPoint`.
///
/// Data points are required unless marked optional.
#[derive(Debug, Default)]
pub struct DataPointBuilder {
    name: String,
    data_type: String,
    description: String,
    optional: bool,
    depends: Vec<String>,
    tags: Vec<String>,
    egress: Option<serde_json::Value>,
}

impl DataPointBuilder {
    /// Creates a new data point builder.
    ///
    /// # Arguments
    ///
    /// * `name` - Field name
    /// * `data_type` - Semantic type tag (e.g. "STRING")
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ..Default::default()
        }
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the data point as optional (or required).
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Sets the upstream data points this one depends on.
    pub fn depends(mut self, depends: Vec<String>) -> Self {
        self.depends = depends;
        self
    }

    /// Sets the tags.
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Attaches egress metadata.
    pub fn egress(mut self, egress: serde_json::Value) -> Self {
        self.egress = Some(egress);
        self
    }

    /// Builds the data point.
    pub fn build(self) -> DataPoint {
        DataPoint {
            name: self.name,
            description: self.description,
            data_type: self.data_type,
            optional: self.optional,
            depends: self.depends,
            tags: self.tags,
            egress: self.egress,
        }
    }
}
