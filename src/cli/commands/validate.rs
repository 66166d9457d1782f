//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the georef configuration file.

use super::{EXIT_CONFIG, EXIT_SUCCESS};
use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates as part of loading
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  API: {}", config.api.base_url);
        println!(
            "  Token: {}",
            if config.api.token.is_some() {
                "set"
            } else {
                "not set"
            }
        );
        println!("  Page Cap: {}", config.fetch.page_cap);
        println!("  Max Concurrency: {}", config.fetch.max_concurrency);
        println!("  Max Retries: {}", config.fetch.retry.max_retries);
        println!("  Diff Origin: {}", config.diff.origin_url);
        println!("  Diff Output: {}", config.diff.output_dir);
        println!(
            "  Normalize Chunk/Batch: {}/{}",
            config.normalize.chunk_size, config.normalize.batch_size
        );
        println!();
        Ok(EXIT_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fetch]\nmax_concurrency = 4").unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, EXIT_SUCCESS);
    }

    #[tokio::test]
    async fn test_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fetch]\nmax_concurrency = 0").unwrap();

        let code = ValidateArgs {}
            .execute(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let code = ValidateArgs {}
            .execute("/nonexistent/georef.toml")
            .await
            .unwrap();
        assert_eq!(code, EXIT_CONFIG);
    }
}
