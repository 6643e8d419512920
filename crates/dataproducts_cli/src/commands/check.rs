use anyhow::{Context, Result};
use dataproducts_parquet::to_columnar_schema;
use dataproducts_parser::CatalogStore;
use std::path::Path;
use tracing::info;

use crate::output;

pub fn execute(id: &str, catalog_dir: &Path, format: &str) -> Result<()> {
    info!("Checking data product {} in {}", id, catalog_dir.display());

    let catalog = CatalogStore::new(catalog_dir);
    let definition = catalog
        .get_by_id(id)
        .with_context(|| format!("Failed to resolve data product: {id}"))?;
    let schema = to_columnar_schema(&definition)
        .with_context(|| format!("Data product {id} has an invalid schema"))?;

    if format != "json" {
        output::print_success("Data product definition is valid");
    }
    output::print_definition(&definition, &schema, format);

    Ok(())
}
