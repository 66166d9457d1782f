//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for georef using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// georef - Georef API diff and address normalization tool
#[derive(Parser, Debug)]
#[command(name = "georef")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (optional; defaults apply when absent)
    #[arg(short, long, default_value = "georef.toml", env = "GEOREF_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "GEOREF_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare the layers of a deployment against the origin deployment
    Diff(commands::diff::DiffArgs),

    /// Normalize the addresses of a CSV file
    Normalize(commands::normalize::NormalizeArgs),

    /// Match the names of a CSV column against one layer
    Similar(commands::lookup::SimilarArgs),

    /// Resolve the coordinates of a CSV file to their territorial units
    Locate(commands::lookup::LocateArgs),

    /// Summarize the layers of a deployment per province
    Info(commands::info::InfoArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),
}
