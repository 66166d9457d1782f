//! Configuration management for georef.
//!
//! # Overview
//!
//! georef uses an optional TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `GEOREF_<SECTION>_<KEY>` environment overrides
//! - Default values for every setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use georef::config::load_config_or_default;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config_or_default("georef.toml")?;
//! println!("API: {}", config.api.base_url);
//! println!("Page cap: {}", config.fetch.page_cap);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`ApiConfig`] - Base URL, bearer token, timeouts
//! - [`FetchConfig`] - Page cap, concurrency, fail-fast, retry policy
//! - [`RateConfig`] - Fallback quota tiers and retry inflation
//! - [`DiffConfig`] - Origin deployment, report directory and format
//! - [`NormalizeConfig`] - Chunk and batch sizes, output prefix
//! - [`LoggingConfig`] - Optional JSON file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [api]
//! base_url = "https://apis.datos.gob.ar/georef/api/"
//! token = "${GEOREF_TOKEN}"
//!
//! [fetch]
//! max_concurrency = 8
//!
//! [diff]
//! extension = "both"
//! output_dir = "./reports"
//!
//! [normalize]
//! chunk_size = 5000
//! batch_size = 1000
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, load_config_or_default, parse_config};
pub use schema::{
    ApiConfig, ApplicationConfig, DiffConfig, FetchConfig, GeorefConfig, LoggingConfig,
    NormalizeConfig, OutputExtension, RateConfig, RetryConfig, DEFAULT_BASE_URL,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
