//! Normalize command implementation
//!
//! Normalizes the addresses of a CSV file against a Georef deployment and
//! writes the results to a new CSV file.

use super::{exit_code_for, load_with_token, EXIT_CONFIG, EXIT_PARTIAL, EXIT_SUCCESS};
use crate::adapters::georef::{GeorefClient, QueryOptions};
use crate::core::normalize::{count_rows, normalize_file, BatchNormalizer, NormalizeSettings};
use crate::core::rate::plan_governor;
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Arguments for the normalize command
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// CSV file with the addresses
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

    /// Addresses per bulk request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Prefix of the normalized output columns
    #[arg(long)]
    pub prefix: Option<String>,

    /// Input column holding the address
    #[arg(long)]
    pub address_column: Option<String>,

    /// Candidate fields to request (API `campos` parameter)
    #[arg(long)]
    pub campos: Option<String>,

    /// Only accept exact matches
    #[arg(long)]
    pub exacto: bool,
}

impl NormalizeArgs {
    /// Execute the normalize command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(input = %self.input.display(), "Starting normalize command");

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
        if self.prefix.is_some() {
            config.normalize.prefix = self.prefix.clone();
        }
        if let Some(column) = &self.address_column {
            config.normalize.address_column = column.clone();
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

        let options = QueryOptions {
            campos: self.campos.clone(),
            exacto: self.exacto.then_some(true),
            ..Default::default()
        };
        let settings = NormalizeSettings::from_config(&config.normalize, config.fetch.retry.clone())
            .with_options(options);

        let governor = plan_governor(
            &client,
            total,
            settings.batch_size,
            &config.rate,
            settings.max_concurrency,
        )
        .await
        .with_shutdown(shutdown_signal);

        println!("🚀 Normalizing {total} addresses against {}", config.api.base_url);
        if let Some(rps) = governor.requests_per_second() {
            println!("  Pace: {rps:.2} requests/s");
        }
        println!();

        let chunk_size = settings.chunk_size;
        let normalizer = BatchNormalizer::new(&client, &governor, settings);
        let summary = match normalize_file(
            &normalizer,
            &self.input,
            &self.output,
            chunk_size,
            &config.normalize.address_column,
            config.normalize.prefix.clone(),
        )
        .await
        {
            Ok(s) => s,
            Err(e) => {
                crate::log_error_with_context!(e, "Normalization failed");
                eprintln!("Normalization failed: {e}");
                println!("  Rows processed before the failure: {}", normalizer.processed());
                return Ok(exit_code_for(&e));
            }
        };

        summary.log_summary();

        println!("📊 Normalization Summary:");
        println!("  Total rows: {}", summary.total);
        println!("  Normalized: {}", summary.normalized);
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
