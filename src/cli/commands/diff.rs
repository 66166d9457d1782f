//! Diff command implementation
//!
//! Compares every layer (or the selected ones) of a target deployment
//! against the origin deployment and writes one report per layer.

use super::{
    exit_code_for, fetch_governor, load_with_token, EXIT_CONFIG, EXIT_CONNECTION, EXIT_PARTIAL,
    EXIT_SUCCESS,
};
use crate::adapters::georef::{GeorefApi, GeorefClient};
use crate::config::OutputExtension;
use crate::core::diff::{write_layer, DiffPipeline, LayerDiff};
use crate::core::fetch::FetchSettings;
use crate::domain::{EntityType, GeorefError};
use clap::Args;
use std::path::Path;
use std::time::Instant;
use tokio::sync::watch;

/// Arguments for the diff command
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Base URL of the deployment under test
    #[arg(value_name = "TARGET_URL")]
    pub target_url: String,

    /// Base URL of the reference deployment (defaults to diff.origin_url)
    #[arg(long)]
    pub origin_url: Option<String>,

    /// Bearer token for the hosted API
    #[arg(long)]
    pub token: Option<String>,

    /// Layers to compare (comma-separated, defaults to all)
    #[arg(long, value_delimiter = ',')]
    pub layer: Vec<EntityType>,

    /// Report format (json, csv or both)
    #[arg(long)]
    pub extension: Option<OutputExtension>,

    /// Directory for the report files
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Abort a layer on its first failed partition
    #[arg(long)]
    pub fail_fast: bool,
}

impl DiffArgs {
    /// Execute the diff command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(target_url = %self.target_url, "Starting diff command");

        let mut config = match load_with_token(config_path, self.token.as_deref()) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if let Some(origin_url) = &self.origin_url {
            config.diff.origin_url = origin_url.clone();
        }
        if let Some(extension) = self.extension {
            config.diff.extension = extension;
        }
        if let Some(output_dir) = &self.output_dir {
            config.diff.output_dir = output_dir.clone();
        }
        config.fetch.fail_fast |= self.fail_fast;

        if let Err(e) = url::Url::parse(&self.target_url) {
            eprintln!("Invalid target URL '{}': {e}", self.target_url);
            return Ok(EXIT_CONFIG);
        }
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }

        let source_api = config.api.with_base_url(config.diff.origin_url.clone());
        let target_api = config.api.with_base_url(self.target_url.clone());
        let (source, target) = match (GeorefClient::new(&source_api), GeorefClient::new(&target_api))
        {
            (Ok(source), Ok(target)) => (source, target),
            (Err(e), _) | (_, Err(e)) => {
                eprintln!("Failed to create API client: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let layers = if self.layer.is_empty() {
            EntityType::ALL.to_vec()
        } else {
            self.layer.clone()
        };

        // Both sides share one governor; the hosted side sets the pace
        let (paced, hosted) = if source_api.is_hosted() {
            (&source as &dyn GeorefApi, true)
        } else {
            (&target as &dyn GeorefApi, target_api.is_hosted())
        };
        let governor = fetch_governor(
            paced,
            hosted,
            2 * layers.len(),
            &config,
            shutdown_signal.clone(),
        )
        .await;
        let pipeline = DiffPipeline::new(
            &source,
            &target,
            FetchSettings::from_config(&config.fetch),
            &governor,
        )
        .with_exclude_patterns(config.diff.exclude_paths.clone());
        let output_dir = Path::new(&config.diff.output_dir);

        println!("🔍 Comparing {} against {}", target_api.base_url, source_api.base_url);
        println!();

        let start = Instant::now();
        let mut partial = false;
        let mut unavailable = Vec::new();

        for entity in &layers {
            if *shutdown_signal.borrow() {
                println!("⚠️  Interrupted before {entity}");
                partial = true;
                break;
            }

            let layer = match pipeline.diff_layer(*entity).await {
                Ok(layer) => layer,
                Err(GeorefError::Api(e)) if e.is_unreachable() => {
                    tracing::warn!(entity = %entity, error = %e, "Layer unavailable");
                    println!("⚠️  {entity}: unavailable ({e})");
                    unavailable.push(*entity);
                    continue;
                }
                Err(e @ GeorefError::Cancelled(_)) => {
                    println!("⚠️  {entity}: {e}");
                    partial = true;
                    break;
                }
                Err(e) => {
                    tracing::error!(entity = %entity, error = %e, "Layer diff failed");
                    eprintln!("Diff of {entity} failed: {e}");
                    return Ok(exit_code_for(&e));
                }
            };

            let written = match write_layer(&layer, output_dir, config.diff.extension) {
                Ok(paths) => paths,
                Err(e) => {
                    eprintln!("Failed to write the {entity} report: {e}");
                    return Ok(exit_code_for(&e));
                }
            };

            print_layer(&layer, &written);
            partial |= !layer.is_complete();
        }

        println!(
            "Compared {} layers in {:.2}s",
            layers.len() - unavailable.len(),
            start.elapsed().as_secs_f64()
        );

        if !unavailable.is_empty() && unavailable.len() == layers.len() {
            eprintln!("No layer could be fetched");
            return Ok(EXIT_CONNECTION);
        }
        if partial || !unavailable.is_empty() {
            return Ok(EXIT_PARTIAL);
        }
        Ok(EXIT_SUCCESS)
    }
}

fn print_layer(layer: &LayerDiff, written: &[std::path::PathBuf]) {
    let result = &layer.result;
    let status = if result.is_empty() { "✅" } else { "📊" };

    println!("{status} {}:", layer.entity);
    println!("  Source registers: {}", layer.source.collection.len());
    println!("  Target registers: {}", layer.target.collection.len());
    println!("  Added: {}", result.added.len());
    println!("  Removed: {}", result.removed.len());
    println!("  Changed: {}", result.changed_ids().len());

    let failures: Vec<_> = layer
        .source
        .failures
        .iter()
        .chain(&layer.target.failures)
        .collect();
    if !failures.is_empty() {
        println!("  ⚠️  Failed partitions: {}", failures.len());
        println!("  ⚠️  Added/removed ids withheld: {}", layer.withheld);
        for failure in failures.iter().take(10) {
            println!("    - {failure}");
        }
        if failures.len() > 10 {
            println!("    ... and {} more", failures.len() - 10);
        }
    }

    for path in written {
        println!("  Report: {}", path.display());
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> DiffArgs {
        match Cli::parse_from(args).command {
            Commands::Diff(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_layers_and_extension() {
        let args = parse(&[
            "georef",
            "diff",
            "http://localhost:5000/api/",
            "--layer",
            "provincias,localidades_censales",
            "--extension",
            "both",
            "--fail-fast",
        ]);

        assert_eq!(
            args.layer,
            vec![EntityType::Provinces, EntityType::CensusLocalities]
        );
        assert_eq!(args.extension, Some(OutputExtension::Both));
        assert!(args.fail_fast);
    }

    #[test]
    fn test_unknown_layer_is_rejected() {
        let result = Cli::try_parse_from(["georef", "diff", "http://x/", "--layer", "barrios"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_target_url_is_config_error() {
        let args = parse(&["georef", "diff", "not a url"]);
        let (_tx, rx) = watch::channel(false);

        let code = args
            .execute("/nonexistent/georef.toml", rx)
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
