//! Constituent harvester CLI.
//!
//! Fetches the configured page, extracts and validates the constituents
//! table, and writes `<base>.csv` / `<base>.json`. On failure nothing is
//! written and the process exits non-zero.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use constituent_harvester::harvest::HarvestPipeline;
use constituent_harvester::{
    write_outputs, HarvestConfig, HttpFetcher, RetryOrchestrator, RetryPolicy, TracingSink,
};

#[derive(Parser)]
#[command(
    name = "constituent-harvester",
    about = "Scrape an index constituents table into CSV and JSON"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Page URL to scrape.
    #[arg(long)]
    url: Option<String>,

    /// Directory for the CSV and JSON files.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Maximum number of attempts.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Minimum number of records for the table to be accepted.
    #[arg(long)]
    min_records: Option<usize>,

    /// Run the pipeline and print a summary without writing files.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl Cli {
    fn load_config(&self) -> Result<HarvestConfig> {
        let mut config = match &self.config {
            Some(path) => HarvestConfig::from_toml_file(path)?,
            None => HarvestConfig::default(),
        };

        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(min_records) = self.min_records {
            config.min_records = min_records;
        }

        config.validate()?;
        Ok(config)
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;
    info!(url = %config.url, max_attempts = config.max_attempts, "Harvest starting");

    let fetcher = HttpFetcher::from_config(&config)?;
    let pipeline = HarvestPipeline::from_config(&config).with_sink(Arc::new(TracingSink));
    info!(strategies = ?pipeline.strategy_names(), "Extraction strategies");
    let orchestrator = RetryOrchestrator::new(fetcher, pipeline, RetryPolicy::from_config(&config));

    let report = orchestrator.run().await?;

    if cli.dry_run {
        println!(
            "{} constituents after {} attempt(s); nothing written (dry run)",
            report.records.len(),
            report.attempts
        );
        for record in report.records.iter().take(5) {
            println!("  {:<6} {}", record.ticker, record.company);
        }
        return Ok(());
    }

    let paths = write_outputs(&report.records, &config.output_dir, &config.base_filename)
        .context("writing output files")?;
    println!("Number of companies: {}", report.records.len());
    println!("- CSV: {}", paths.csv.display());
    println!("- JSON: {}", paths.json.display());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("constituent_harvester=info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
