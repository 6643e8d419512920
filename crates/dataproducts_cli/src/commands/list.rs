use anyhow::{Context, Result};
use dataproducts_parser::{CatalogStore, DuplicatePolicy};
use std::path::Path;
use tracing::info;

use crate::output;

pub fn execute(catalog_dir: &Path, strict: bool, format: &str) -> Result<()> {
    info!("Listing data products in {}", catalog_dir.display());

    let policy = if strict {
        DuplicatePolicy::Reject
    } else {
        DuplicatePolicy::Warn
    };
    let catalog = CatalogStore::new(catalog_dir).with_duplicate_policy(policy);
    let index = catalog
        .load_all()
        .with_context(|| format!("Failed to load catalog: {}", catalog_dir.display()))?;

    let definitions: Vec<_> = index.values().collect();
    output::print_catalog(&definitions, format);

    Ok(())
}
