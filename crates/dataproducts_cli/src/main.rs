mod commands;
mod output;
mod pipeline;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pipeline::{DEFAULT_CATALOG_DIR, Overrides, PipelineFile, RunSettings};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dpx")]
#[command(version, about = "Data products to Parquet CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log filter, e.g. "info" or "dataproducts_parquet=debug"
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a data product and show its columnar schema
    Check {
        /// Data product id
        id: String,

        /// Catalog directory
        #[arg(long, env = "CATALOG_DIR", default_value = DEFAULT_CATALOG_DIR)]
        catalog_dir: PathBuf,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List every data product in the catalog
    List {
        /// Catalog directory
        #[arg(long, env = "CATALOG_DIR", default_value = DEFAULT_CATALOG_DIR)]
        catalog_dir: PathBuf,

        /// Fail on duplicate ids instead of warning
        #[arg(short, long)]
        strict: bool,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Stream a query into Parquet files, one per batch
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Pipeline file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalog directory
    #[arg(long, env = "CATALOG_DIR")]
    catalog_dir: Option<PathBuf>,

    /// Id of the data product governing the output
    #[arg(long, env = "DATA_PRODUCT_ID")]
    data_product_id: Option<String>,

    /// Database driver: postgres, sqlite
    #[arg(long, env = "DRIVER")]
    driver: Option<String>,

    /// Data source name
    #[arg(long, env = "DSN", hide_env_values = true)]
    dsn: Option<String>,

    /// Static query to run
    #[arg(long, env = "QUERY")]
    query: Option<String>,

    /// Rows per output file
    #[arg(long)]
    batch_size: Option<usize>,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Creation timestamp (seconds since the epoch); defaults to now
    #[arg(long)]
    created_at: Option<i64>,
}

impl RunArgs {
    fn into_settings(self) -> Result<RunSettings> {
        let file = match &self.config {
            Some(path) => PipelineFile::load(path)?,
            None => PipelineFile::default(),
        };
        let overrides = Overrides {
            catalog_dir: self.catalog_dir,
            data_product_id: self.data_product_id,
            driver: self.driver,
            dsn: self.dsn,
            query: self.query,
            batch_size: self.batch_size,
            output_dir: self.output_dir,
            created_at: self.created_at,
        };
        RunSettings::resolve(file, overrides, chrono::Utc::now().timestamp())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .compact(),
        )
        .with(filter)
        .init();

    if let Err(e) = run(cli.command).await {
        output::print_error(&format!("Error: {e:#}"));
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Check {
            id,
            catalog_dir,
            format,
        } => commands::check::execute(&id, &catalog_dir, &format),

        Commands::List {
            catalog_dir,
            strict,
            format,
        } => commands::list::execute(&catalog_dir, strict, &format),

        Commands::Run(args) => commands::run::execute(args.into_settings()?).await,
    }
}
