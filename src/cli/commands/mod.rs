//! CLI command implementations
//!
//! Every command returns its process exit code:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Partial failure (failed partitions, error rows, interrupted) |
//! | 2 | Configuration error |
//! | 4 | Connection error |
//! | 5 | Fatal error |

pub mod diff;
pub mod info;
pub mod lookup;
pub mod normalize;
pub mod validate;

use crate::adapters::georef::GeorefApi;
use crate::config::{load_config_or_default, secret_string_opt, GeorefConfig};
use crate::core::rate::{plan_fetch_governor, RateGovernor};
use crate::domain::{GeorefError, Result};
use tokio::sync::watch;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_CONNECTION: i32 = 4;
pub const EXIT_FATAL: i32 = 5;

/// Loads the configuration and applies a `--token` override
pub(crate) fn load_with_token(config_path: &str, token: Option<&str>) -> Result<GeorefConfig> {
    let mut config = load_config_or_default(config_path)?;
    if let Some(token) = secret_string_opt(token.map(str::to_string)) {
        tracing::info!("Using API token from the command line");
        config.api.token = Some(token);
    }
    Ok(config)
}

/// Governor for `layers` whole-collection fetches
///
/// A hosted deployment reports its quota and is paced for the expected
/// request count; self-hosted deployments only get the concurrency bound.
pub(crate) async fn fetch_governor(
    api: &dyn GeorefApi,
    hosted: bool,
    layers: usize,
    config: &GeorefConfig,
    shutdown_signal: watch::Receiver<bool>,
) -> RateGovernor {
    let governor = if hosted {
        plan_fetch_governor(api, layers, &config.rate, config.fetch.max_concurrency).await
    } else {
        RateGovernor::unthrottled(config.fetch.max_concurrency)
    };
    governor.with_shutdown(shutdown_signal)
}

/// Exit code of an error that ended a command
pub(crate) fn exit_code_for(error: &GeorefError) -> i32 {
    match error {
        GeorefError::Configuration(_) | GeorefError::UnknownEntity(_) => EXIT_CONFIG,
        GeorefError::Validation(_) => EXIT_CONFIG,
        GeorefError::Api(e) if e.is_unreachable() => EXIT_CONNECTION,
        GeorefError::Partition(_) | GeorefError::Cancelled(_) => EXIT_PARTIAL,
        _ => EXIT_FATAL,
    }
}
