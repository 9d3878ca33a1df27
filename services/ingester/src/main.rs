//! Hail swath ingester.
//!
//! Pulls MRMS MESH grids from the public NOAA bucket, extracts threshold
//! swaths per calendar day and keeps them in the local swath store.

mod daily;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ingestion::{lookback_start, previous_day, BatchDriver, DayIngester, IngestionConfig};
use storage::{ReadFilter, SwathStore};
use swath_common::{BoundingBox, DayKey, ThresholdSet};

#[derive(Parser, Debug)]
#[command(name = "ingester")]
#[command(about = "MRMS hail swath ingester")]
struct Args {
    /// YAML configuration file (default: environment variables)
    #[arg(short, long, global = true, env = "INGESTER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a single day
    Day {
        /// Day to ingest (YYYY-MM-DD)
        date: String,
    },

    /// Ingest every day in an inclusive range
    Range {
        /// First day (default: end minus the configured lookback)
        #[arg(long)]
        start: Option<String>,

        /// Last day (default: yesterday UTC)
        #[arg(long)]
        end: Option<String>,
    },

    /// Ingest yesterday every day after noon UTC
    Daily {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Write a day's swaths as GeoJSON, ingesting it first if needed
    Read {
        /// Day to read (YYYY-MM-DD)
        date: String,

        /// Comma-separated thresholds in inches (default: all)
        #[arg(long)]
        thresholds: Option<String>,

        /// Region as min_lon,min_lat,max_lon,max_lat
        #[arg(long, allow_hyphen_values = true)]
        bbox: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<IngestionConfig> {
    let config = match path {
        Some(path) => IngestionConfig::from_yaml(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => IngestionConfig::from_env().context("reading configuration from environment")?,
    };
    Ok(config)
}

/// Resolve the batch range, rejecting an inverted one before any work.
fn resolve_range(
    start: Option<&str>,
    end: Option<&str>,
    lookback_days: u32,
) -> Result<(DayKey, DayKey)> {
    let end = match end {
        Some(s) => DayKey::parse(s)?,
        None => previous_day(Utc::now()),
    };
    let start = match start {
        Some(s) => DayKey::parse(s)?,
        None => lookback_start(end, lookback_days),
    };
    if start > end {
        bail!("start date {} is after end date {}", start, end);
    }
    Ok((start, end))
}

fn read_filter(thresholds: Option<&str>, bbox: Option<&str>) -> Result<ReadFilter> {
    let mut filter = ReadFilter::all();
    if let Some(t) = thresholds {
        filter = filter.with_thresholds(ThresholdSet::parse(t)?);
    }
    if let Some(b) = bbox {
        filter = filter.with_region(BoundingBox::parse(b)?);
    }
    Ok(filter)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&args.log_level))
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(args.config.as_ref())?;
    info!(
        product = %config.product.name,
        bucket = %config.source.bucket,
        database = %config.database_path.display(),
        "Starting hail swath ingester"
    );

    // Parameters are validated before the store or any source is touched.
    match &args.command {
        Command::Day { date } => {
            let day = DayKey::parse(date)?;
            let ingester = open_ingester(&config).await?;
            let result = ingester.run(day).await?;
            info!(
                date = %day,
                outcome = ?result.outcome,
                swaths = result.swaths.len(),
                "Day finished"
            );
        }
        Command::Range { start, end } => {
            let (start, end) =
                resolve_range(start.as_deref(), end.as_deref(), config.lookback_days)?;
            let driver = BatchDriver::new(open_ingester(&config).await?, config.concurrency);
            let summary = driver.run(start, end).await?;
            println!(
                "{} days: {} completed, {} failed",
                summary.total, summary.completed, summary.failed
            );
        }
        Command::Daily { once } => {
            let ingester = open_ingester(&config).await?;
            daily::run(&ingester, *once).await;
        }
        Command::Read {
            date,
            thresholds,
            bbox,
            output,
        } => {
            let day = DayKey::parse(date)?;
            let filter = read_filter(thresholds.as_deref(), bbox.as_deref())?;
            let ingester = open_ingester(&config).await?;
            let swaths = ingester.swaths(day, &filter).await?;
            let geojson = swaths.to_geojson_string()?;
            match output {
                Some(path) => {
                    std::fs::write(path, geojson)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), features = swaths.len(), "Wrote GeoJSON");
                }
                None => println!("{}", geojson),
            }
        }
    }

    Ok(())
}

async fn open_ingester(config: &IngestionConfig) -> Result<DayIngester> {
    let store = SwathStore::open(&config.database_path)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    Ok(DayIngester::from_config(config, store)?)
}
