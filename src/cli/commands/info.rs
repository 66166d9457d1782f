//! Info command implementation

use super::{exit_code_for, fetch_governor, load_with_token, EXIT_CONFIG, EXIT_PARTIAL, EXIT_SUCCESS};
use crate::adapters::georef::GeorefClient;
use crate::core::fetch::FetchSettings;
use crate::core::info::collect_info;
use crate::domain::EntityType;
use clap::Args;
use std::path::PathBuf;
use tokio::sync::watch;

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Base URL of the deployment (defaults to api.base_url)
    #[arg(long)]
    pub url: Option<String>,

    /// Bearer token for the hosted API
    #[arg(long)]
    pub token: Option<String>,

    /// JSON file to write the summary to
    #[arg(long, default_value = "info.json")]
    pub output: PathBuf,
}

impl InfoArgs {
    /// Execute the info command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
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
        if let Err(e) = config.validate() {
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }

        tracing::info!(base_url = %config.api.base_url, "Starting info command");

        let client = match GeorefClient::new(&config.api) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to create API client: {e}");
                return Ok(EXIT_CONFIG);
            }
        };
        let governor = fetch_governor(
            &client,
            config.api.is_hosted(),
            EntityType::ALL.len(),
            &config,
            shutdown_signal,
        )
        .await;
        let settings = FetchSettings::from_config(&config.fetch);

        let summary = match collect_info(&client, &settings, &governor).await {
            Ok(s) => s,
            Err(e) => {
                crate::log_error_with_context!(e, "Info failed");
                eprintln!("Info failed: {e}");
                return Ok(exit_code_for(&e));
            }
        };

        if let Err(e) = summary.write_json(&self.output) {
            eprintln!("Failed to write {}: {e}", self.output.display());
            return Ok(exit_code_for(&e));
        }

        println!("📊 {}", summary.base_url);
        for (entity, total) in &summary.totals {
            println!("  {entity}: {total}");
        }
        println!("  Provinces: {}", summary.provinces.len());
        if !summary.is_complete() {
            println!("  ⚠️  Failed partitions: {}", summary.failures.len());
        }
        println!("  Summary: {}", self.output.display());
        println!();

        if summary.is_complete() {
            Ok(EXIT_SUCCESS)
        } else {
            Ok(EXIT_PARTIAL)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_default_output() {
        let cli = Cli::parse_from(["georef", "info", "--url", "http://localhost:5000/api/"]);
        let Commands::Info(args) = cli.command else {
            panic!("expected info");
        };
        assert_eq!(args.output, PathBuf::from("info.json"));
        assert_eq!(args.url.as_deref(), Some("http://localhost:5000/api/"));
    }
}
