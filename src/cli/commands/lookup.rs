//! Similar and locate command implementations
//!
//! `similar` matches a name column of a CSV file against one entity layer;
//! `locate` resolves a coordinate pair column to its territorial units.
//! Both keep every input column and append the flattened answer.

use super::{exit_code_for, load_with_token, EXIT_CONFIG, EXIT_PARTIAL, EXIT_SUCCESS};
use crate::adapters::georef::GeorefClient;
use crate::core::normalize::{count_rows, lookup_file, BatchLookup, LookupTarget, NormalizeSettings};
use crate::core::rate::plan_governor;
use crate::domain::EntityType;
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Input, output and tuning shared by the lookup commands
#[derive(Args, Debug)]
pub struct LookupArgs {
    /// CSV file to resolve
    #[arg(value_name = "INPUT_CSV")]
    pub input: PathBuf,

    /// CSV file to write
    #[arg(value_name = "OUTPUT_CSV")]
    pub output: PathBuf,

    /// Base URL of the deployment (defaults to api.base_url)
    #[arg(long)]
    pub url: Option<String>,

    /// Bearer token for the hosted API
    #[arg(long)]
    pub token: Option<String>,

    /// Rows read and written per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Queries per bulk request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Prefix of the appended columns
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Arguments for the similar command
#[derive(Args, Debug)]
pub struct SimilarArgs {
    /// Layer to match names against
    #[arg(value_name = "ENTITY")]
    pub entity: EntityType,

    #[command(flatten)]
    pub files: LookupArgs,

    /// Input column holding the name
    #[arg(long, default_value = "nombre")]
    pub column: String,
}

/// Arguments for the locate command
#[derive(Args, Debug)]
pub struct LocateArgs {
    #[command(flatten)]
    pub files: LookupArgs,

    /// Input column holding the latitude
    #[arg(long, default_value = "lat")]
    pub lat_column: String,

    /// Input column holding the longitude
    #[arg(long, default_value = "lon")]
    pub lon_column: String,
}

impl SimilarArgs {
    /// Execute the similar command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let target = LookupTarget::Names {
            entity: self.entity,
            column: self.column.clone(),
        };
        self.files.run(&target, config_path, shutdown_signal).await
    }
}

impl LocateArgs {
    /// Execute the locate command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let target = LookupTarget::Points {
            lat_column: self.lat_column.clone(),
            lon_column: self.lon_column.clone(),
        };
        self.files.run(&target, config_path, shutdown_signal).await
    }
}

impl LookupArgs {
    async fn run(
        &self,
        target: &LookupTarget,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(input = %self.input.display(), target = ?target, "Starting lookup command");

        let mut config = match load_with_token(config_path, self.token.as_deref()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if let Some(url) = &self.url {
            config.api = config.api.with_base_url(url.clone());
        }
        if let Some(chunk_size) = self.chunk_size {
            config.normalize.chunk_size = chunk_size;
        }
        if let Some(batch_size) = self.batch_size {
            config.normalize.batch_size = batch_size;
        }

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }
        if !self.input.is_file() {
            eprintln!("Input file not found: {}", self.input.display());
            return Ok(EXIT_CONFIG);
        }

        let client = match GeorefClient::new(&config.api) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to create API client: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let total = match count_rows(&self.input) {
            Ok(n) => n,
            Err(e) => {
                eprintln!("Failed to read {}: {e}", self.input.display());
                return Ok(exit_code_for(&e));
            }
        };

        let settings = NormalizeSettings::from_config(&config.normalize, config.fetch.retry.clone());
        let governor = plan_governor(
            &client,
            total,
            settings.batch_size,
            &config.rate,
            settings.max_concurrency,
        )
        .await
        .with_shutdown(shutdown_signal);

        println!("🚀 Resolving {total} rows against {}", config.api.base_url);
        println!();

        let chunk_size = settings.chunk_size;
        let lookup = BatchLookup::new(&client, &governor, settings);
        let summary = match lookup_file(
            &lookup,
            target,
            &self.input,
            &self.output,
            chunk_size,
            self.prefix.clone(),
        )
        .await
        {
            Ok(s) => s,
            Err(e) => {
                crate::log_error_with_context!(e, "Lookup failed");
                eprintln!("Lookup failed: {e}");
                println!("  Rows processed before the failure: {}", lookup.processed());
                return Ok(exit_code_for(&e));
            }
        };

        summary.log_summary();

        println!("📊 Lookup Summary:");
        println!("  Total rows: {}", summary.total);
        println!("  Found: {}", summary.normalized);
        println!("  Not found: {}", summary.not_found);
        println!("  Errors: {}", summary.errored);
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!("  Output: {}", self.output.display());
        println!();

        if summary.is_complete() {
            Ok(EXIT_SUCCESS)
        } else {
            Ok(EXIT_PARTIAL)
        }
    }
}
