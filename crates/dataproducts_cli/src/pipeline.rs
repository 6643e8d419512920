//! Pipeline settings: an optional YAML file overridden by flags and environment.

use anyhow::{Context, Result, anyhow};
use dataproducts_parquet::CompressionCodec;
use dataproducts_source::{PoolSettings, SourceConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CATALOG_DIR: &str = "catalog";
pub const DEFAULT_OUTPUT_DIR: &str = "out";
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Contents of a `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineFile {
    #[serde(default)]
    pub catalog_dir: Option<PathBuf>,
    #[serde(default)]
    pub data_product_id: Option<String>,
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub compression: Option<CompressionCodec>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub dsn: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub pool: PoolSettings,
}

impl PipelineFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse pipeline file: {}", path.display()))
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub catalog_dir: Option<PathBuf>,
    pub data_product_id: Option<String>,
    pub driver: Option<String>,
    pub dsn: Option<String>,
    pub query: Option<String>,
    pub batch_size: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub created_at: Option<i64>,
}

/// Fully resolved settings for one run.
#[derive(Debug)]
pub struct RunSettings {
    pub catalog_dir: PathBuf,
    pub data_product_id: String,
    pub source: SourceConfig,
    pub batch_size: usize,
    pub output_dir: PathBuf,
    pub compression: CompressionCodec,
    pub created_at: i64,
}

impl RunSettings {
    /// Merges flags over the file. `now` fills in a missing creation timestamp.
    pub fn resolve(file: PipelineFile, overrides: Overrides, now: i64) -> Result<Self> {
        let data_product_id = overrides
            .data_product_id
            .or(file.data_product_id)
            .ok_or_else(|| missing("data product id", "--data-product-id", "DATA_PRODUCT_ID"))?;
        let driver = overrides
            .driver
            .or(file.source.driver)
            .ok_or_else(|| missing("driver", "--driver", "DRIVER"))?;
        let dsn = overrides
            .dsn
            .or(file.source.dsn)
            .ok_or_else(|| missing("data source name", "--dsn", "DSN"))?;
        let query = overrides
            .query
            .or(file.source.query)
            .ok_or_else(|| missing("query", "--query", "QUERY"))?;

        let batch_size = overrides
            .batch_size
            .or(file.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(anyhow!("Batch size must be at least 1"));
        }

        let source = SourceConfig::builder()
            .driver(driver)
            .dsn(dsn)
            .query(query)
            .pool(file.source.pool)
            .build()
            .context("Invalid source configuration")?;

        Ok(Self {
            catalog_dir: overrides
                .catalog_dir
                .or(file.catalog_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CATALOG_DIR)),
            data_product_id,
            source,
            batch_size,
            output_dir: overrides
                .output_dir
                .or(file.output_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            compression: file.compression.unwrap_or_default(),
            created_at: overrides.created_at.or(file.created_at).unwrap_or(now),
        })
    }

    /// Path of the file written for batch `seq`.
    pub fn output_path(&self, seq: usize) -> PathBuf {
        self.output_dir
            .join(&self.data_product_id)
            .join(format!("{}-{:05}.parquet", self.created_at, seq))
    }
}

fn missing(what: &str, flag: &str, env: &str) -> anyhow::Error {
    anyhow!("Missing {what}: pass {flag}, set {env}, or add it to the pipeline file")
}
