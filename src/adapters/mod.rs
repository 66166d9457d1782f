//! External system integrations for georef.
//!
//! - [`georef`] - Georef API integration (hosted or self-hosted deployments)
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with mock implementations. The core only depends on the
//! [`georef::GeorefApi`] trait:
//!
//! ```rust,no_run
//! use georef::adapters::georef::{GeorefApi, GeorefClient};
//! use georef::config::ApiConfig;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::default();
//! let api: Arc<dyn GeorefApi> = Arc::new(GeorefClient::new(&config)?);
//! println!("Querying {}", api.base_url());
//! # Ok(())
//! # }
//! ```

pub mod georef;
