// Georef - Georef API diff and address normalization tool
// Copyright (c) 2025 Georef Contributors
// Licensed under the MIT License

//! # georef - Georef API bulk fetch, diff and normalization
//!
//! georef is a client toolkit for the Georef API, the Argentine geographic
//! normalization service. It downloads whole entity collections from a
//! deployment, compares two deployments, and normalizes address files in
//! bulk without exceeding the deployment's quota.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Fetching** complete layers, partitioned by province and department
//!   when a layer is larger than one page
//! - **Diffing** a deployment under test against a reference deployment
//! - **Normalizing** CSV address files through the bulk address endpoint
//! - **Pacing** requests to the remaining quota of the hosted API
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (fetch, rate, diff, normalize, info)
//! - [`adapters`] - The Georef API client
//! - [`domain`] - Entity layers, ids, regions and error types
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use georef::adapters::georef::GeorefClient;
//! use georef::config::ApiConfig;
//! use georef::core::fetch::{fetch_collection, FetchSettings};
//! use georef::core::rate::RateGovernor;
//! use georef::domain::{EntityType, RegionFilter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GeorefClient::new(&ApiConfig::default())?;
//!     let governor = RateGovernor::unthrottled(8);
//!
//!     let outcome = fetch_collection(
//!         &client,
//!         EntityType::Departments,
//!         &RegionFilter::National,
//!         &FetchSettings::default(),
//!         &governor,
//!     )
//!     .await?;
//!
//!     println!("Fetched {} departments", outcome.collection.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! The library uses [`domain::GeorefError`] for errors that end an
//! operation. Failed partitions and failed address rows are reported as
//! data instead, so one bad region never discards the rest of a run.
//!
//! ## Logging
//!
//! georef uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(entity = "calles", "Starting fetch");
//! warn!(partition = "06", "Partition failed");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;

#[cfg(test)]
pub(crate) mod test_support;
