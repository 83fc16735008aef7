//! Search-analytics staging ETL.
//!
//! Stages reporting-API aggregates through two layers:
//! - `rdl`: raw aggregates, one row per (date, page, query, device)
//! - `ppl`: normalized facts plus synthetic per-event detail rows
//!
//! Subcommands cover the loader (API → raw), the transform engine
//! (raw → processed), status reporting, and schema bootstrap.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use collector::{CollectorConfig, RawLoader, ReportsClient};
use etl_core::RunStatus;
use etl_engine::{processing_status, RunnerConfig, TransformRunner};
use postgres_store::{health, PgClient, PgProcessedStore, PgRawStore, PostgresConfig};
use telemetry::init_tracing_from_env;

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    database: PostgresConfig,

    #[serde(default)]
    collector: CollectorConfig,

    /// Rows per transform group in full-catchup mode
    #[serde(default = "default_batch_size")]
    batch_size: i64,
}

fn default_batch_size() -> i64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PostgresConfig::default(),
            collector: CollectorConfig::default(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Parser)]
#[command(name = "search-etl", version, about = "Search-analytics staging ETL")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report watermark lag between the raw and processed layers
    Status,
    /// Transform new raw rows into the processed layer
    Run,
    /// Clear the processed layer and rebuild it from all raw rows
    Reload,
    /// Fetch missing recent dates from the reporting API into the raw layer
    Load {
        /// Override the configured lookback window
        #[arg(long)]
        days_back: Option<u32>,
    },
    /// Create schemas, tables, and indexes (idempotent)
    InitSchema,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    init_tracing_from_env();

    let cli = Cli::parse();
    let config = load_config()?;

    let client = PgClient::connect(config.database.clone())
        .await
        .context("Failed to connect to Postgres")?;

    if !health::check_connection(&client).await {
        bail!("Postgres health check failed");
    }

    let raw = Arc::new(PgRawStore::new(client.clone()));
    let processed = Arc::new(PgProcessedStore::new(client.clone()));

    match cli.command {
        Command::InitSchema => {
            health::init_schema(&client)
                .await
                .context("Schema initialization failed")?;
            println!("Schema initialized");
        }

        Command::Status => {
            let status = processing_status(raw.as_ref(), processed.as_ref()).await?;

            println!("Search analytics staging status");
            println!("  raw watermark:        {}", fmt_date(status.last_raw_date));
            println!(
                "  processed watermark:  {}",
                fmt_date(status.last_processed_date)
            );
            match (status.last_raw_date, status.last_processed_date) {
                (Some(raw_mark), Some(processed_mark)) if raw_mark > processed_mark => {
                    let lag = (raw_mark - processed_mark).num_days();
                    println!("  lag:                  {lag} day(s)");
                }
                (Some(_), Some(_)) => println!("  layers in sync"),
                (None, _) => println!("  raw layer is empty"),
                (Some(_), None) => println!("  processed layer is empty"),
            }
            println!("  unprocessed rows:     {}", status.unprocessed_count);
            if status.needs_processing {
                println!("  run `search-etl run` to catch up");
            }
        }

        Command::Run => {
            let runner = TransformRunner::new(
                raw,
                processed,
                RunnerConfig {
                    batch_size: config.batch_size,
                },
            );
            let report = runner.run_incremental().await?;
            print_report(&report)?;
        }

        Command::Reload => {
            let runner = TransformRunner::new(
                raw,
                processed,
                RunnerConfig {
                    batch_size: config.batch_size,
                },
            );
            let report = runner.run_full_reload().await?;
            print_report(&report)?;
        }

        Command::Load { days_back } => {
            let api = Arc::new(
                ReportsClient::new(config.collector.clone())
                    .context("Failed to create reporting-API client")?,
            );
            let loader = RawLoader::new(api, raw);
            let window = days_back.unwrap_or(config.collector.days_back);

            let summary = loader.load_missing(window).await?;
            println!(
                "Loaded {} date(s), {} row(s) inserted, {} date(s) failed",
                summary.dates_loaded, summary.rows_inserted, summary.dates_failed
            );
            if summary.dates_failed > 0 {
                bail!("{} date(s) failed to load", summary.dates_failed);
            }
        }
    }

    Ok(())
}

fn fmt_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
}

fn print_report(report: &etl_core::RunReport) -> Result<()> {
    println!(
        "status={} processed={} positions={} clicks={} errors={}",
        report.status,
        report.processed,
        report.positions_created,
        report.clicks_created,
        report.errors
    );

    match report.status {
        RunStatus::Failed | RunStatus::Partial => {
            bail!("run ended with status {}", report.status)
        }
        _ => Ok(()),
    }
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ETL")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Conventional single-variable overrides for nested fields
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(token) = std::env::var("ETL_API_TOKEN") {
        config.collector.token = token;
    }
    if let Ok(user_id) = std::env::var("ETL_API_USER_ID") {
        config.collector.user_id = user_id;
    }
    if let Ok(host_id) = std::env::var("ETL_API_HOST_ID") {
        config.collector.host_id = host_id;
    }

    info!(batch_size = config.batch_size, "Loaded configuration");

    Ok(config)
}
