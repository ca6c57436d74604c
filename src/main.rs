use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vehicle_import::{run_import, ImportConfig};

#[derive(Parser)]
#[command(name = "vehicle-import")]
#[command(about = "Stream a JSON array of vehicle records into PostgreSQL")]
struct Args {
    /// Input file holding a JSON array (default: car_data.json, or IMPORT_INPUT)
    input: Option<PathBuf>,

    /// Records per transaction
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Destination table
    #[arg(short, long)]
    table: Option<String>,

    /// PostgreSQL URL (or set DATABASE_URL / PG* env vars)
    #[arg(long)]
    database_url: Option<String>,

    /// Connection pool size
    #[arg(long)]
    max_connections: Option<u32>,

    /// Parse and validate against an in-process store; nothing is written
    #[arg(long)]
    dry_run: bool,

    /// Log filter, overrides RUST_LOG (e.g. "debug", "vehicle_import=trace")
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut ImportConfig) {
        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(table) = self.table {
            config.table = table;
        }
        if let Some(url) = self.database_url {
            config.database.url = Some(url);
        }
        if let Some(max) = self.max_connections {
            config.database.max_connections = max;
        }
        config.dry_run |= self.dry_run;
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();

    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = ImportConfig::from_env()?;
    args.apply(&mut config);

    info!(
        input = %config.input.display(),
        table = %config.table,
        batch_size = config.batch_size,
        dry_run = config.dry_run,
        "Vehicle import starting..."
    );

    match run_import(config).await {
        Ok(summary) => {
            info!(
                run_id = %summary.run_id,
                rows = summary.rows_written,
                batches = summary.batches(),
                peak_buffered = summary.peak_buffered,
                elapsed_ms = summary.elapsed_ms(),
                "Import complete"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(
                phase = err.phase(),
                batch = ?err.failed_batch(),
                error = %err,
                "Error processing data"
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
