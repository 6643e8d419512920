use anyhow::{Context, Result, bail};
use dataproducts_parquet::{BatchConversionEngine, EngineConfig, Message};
use dataproducts_parser::CatalogStore;
use dataproducts_source::{QueryCursor, SourceError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::output;
use crate::pipeline::RunSettings;

#[derive(Debug, Default)]
struct RunSummary {
    rows: usize,
    files: Vec<PathBuf>,
}

pub async fn execute(settings: RunSettings) -> Result<()> {
    info!(
        "Running data product {} (batch size: {})",
        settings.data_product_id, settings.batch_size
    );

    let engine_config = EngineConfig::builder()
        .data_product_id(settings.data_product_id.clone())
        .compression(settings.compression)
        .created_at(settings.created_at)
        .build()
        .context("Invalid engine configuration")?;
    let engine = Arc::new(
        BatchConversionEngine::new(CatalogStore::new(&settings.catalog_dir), engine_config)
            .context("Failed to initialize conversion engine")?,
    );

    let cursor = Arc::new(
        QueryCursor::new(settings.source.clone()).context("Invalid source configuration")?,
    );

    let interrupt = {
        let cursor = Arc::clone(&cursor);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, closing query cursor");
                if let Err(e) = cursor.close(std::future::pending()).await {
                    warn!("Failed to close query cursor: {e}");
                }
            }
        })
    };

    let result = pump(&cursor, &engine, &settings).await;
    let closed = cursor.close(std::future::pending()).await;
    interrupt.abort();

    let summary = result?;
    closed.context("Failed to close query cursor")?;

    output::print_success(&format!(
        "Converted {} rows into {} file(s)",
        summary.rows,
        summary.files.len()
    ));
    for file in &summary.files {
        output::print_info(&file.display().to_string());
    }

    Ok(())
}

async fn pump(
    cursor: &QueryCursor,
    engine: &Arc<BatchConversionEngine>,
    settings: &RunSettings,
) -> Result<RunSummary> {
    cursor
        .connect()
        .await
        .context("Failed to connect query cursor")?;

    let mut summary = RunSummary::default();
    let mut batch = Vec::with_capacity(settings.batch_size);

    loop {
        match cursor.read().await {
            Ok(row) => {
                batch.push(Message::from(row));
                if batch.len() == settings.batch_size {
                    flush(engine, settings, &mut batch, &mut summary).await?;
                }
            }
            Err(e) if e.is_end_of_input() => break,
            Err(SourceError::NotConnected) => {
                bail!("Query cursor was closed before the input was drained")
            }
            Err(e) => return Err(e).context("Failed to read row"),
        }
    }
    flush(engine, settings, &mut batch, &mut summary).await?;

    Ok(summary)
}

async fn flush(
    engine: &Arc<BatchConversionEngine>,
    settings: &RunSettings,
    batch: &mut Vec<Message>,
    summary: &mut RunSummary,
) -> Result<()> {
    let seq = summary.files.len();
    let messages = std::mem::replace(batch, Vec::with_capacity(settings.batch_size));

    // Catalog reload and Parquet encoding are blocking work
    let engine = Arc::clone(engine);
    let converted = tokio::task::spawn_blocking(move || engine.process_batch(&messages))
        .await
        .context("Batch conversion task failed")?
        .with_context(|| format!("Failed to convert batch {seq}"))?;

    let Some(converted) = converted else {
        debug!("Batch {seq} produced no rows, nothing to write");
        return Ok(());
    };

    let path = settings.output_path(seq);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }
    tokio::fs::write(&path, &converted.blob)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Wrote {} rows to {}", converted.row_count, path.display());
    summary.rows += converted.row_count;
    summary.files.push(path);
    Ok(())
}
