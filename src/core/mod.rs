//! Core business logic for georef.
//!
//! # Modules
//!
//! - [`fetch`] - Region-partitioned bulk fetch with concurrent, retried partitions
//! - [`rate`] - Quota probing and request pacing
//! - [`diff`] - Structural diff of two deployments
//! - [`normalize`] - Chunked bulk address normalization
//! - [`info`] - Per-province summary of a deployment
//!
//! # Diff Workflow
//!
//! 1. **Count**: read each layer's total from both deployments
//! 2. **Partition**: split large layers by province and department
//! 3. **Fetch**: run partitions concurrently under the rate governor
//! 4. **Diff**: compare the merged collections with the layer's rules
//! 5. **Report**: write the CSV table and/or the JSON report
//!
//! # Example
//!
//! ```rust,no_run
//! use georef::adapters::georef::GeorefClient;
//! use georef::config::ApiConfig;
//! use georef::core::diff::DiffPipeline;
//! use georef::core::fetch::FetchSettings;
//! use georef::core::rate::RateGovernor;
//! use georef::domain::EntityType;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiConfig::default();
//! let source = GeorefClient::new(&api)?;
//! let target = GeorefClient::new(&api.with_base_url("http://localhost:5000/api/"))?;
//! let governor = RateGovernor::unthrottled(8);
//!
//! let layer = DiffPipeline::new(&source, &target, FetchSettings::default(), &governor)
//!     .diff_layer(EntityType::Provinces)
//!     .await?;
//!
//! println!("Added: {}", layer.result.added.len());
//! println!("Removed: {}", layer.result.removed.len());
//! # Ok(())
//! # }
//! ```

pub mod diff;
pub mod fetch;
pub mod info;
pub mod normalize;
pub mod rate;
