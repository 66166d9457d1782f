//! Adaptive rate governance
//!
//! Before a bulk operation starts, one probe request reads the deployment's
//! quota. The expected request count picks a ceiling, and the resulting
//! [`RateGovernor`] paces every dispatch of the operation.
//!
//! ```rust,no_run
//! use georef::adapters::georef::GeorefClient;
//! use georef::config::{ApiConfig, RateConfig};
//! use georef::core::rate::plan_governor;
//!
//! # async fn example() -> georef::domain::Result<()> {
//! let client = GeorefClient::new(&ApiConfig::default())?;
//! let governor = plan_governor(&client, 25_000, 1000, &RateConfig::default(), 8).await;
//! let _permit = governor.acquire().await?;
//! # Ok(())
//! # }
//! ```

pub mod governor;
pub mod quota;

pub use governor::{GovernorPermit, RateGovernor};
pub use quota::{QuotaSnapshot, RateCeiling, RequestEstimate, Tier, Window};

use crate::adapters::georef::GeorefApi;
use crate::config::RateConfig;
use crate::domain::PROVINCES;

/// Probes the quota and builds a governor for `units` items sent in
/// batches of `batch_size`
pub async fn plan_governor(
    api: &dyn GeorefApi,
    units: usize,
    batch_size: usize,
    config: &RateConfig,
    max_concurrency: usize,
) -> RateGovernor {
    let snapshot = QuotaSnapshot::probe(api, config).await;
    let estimate = RequestEstimate::new(units, batch_size, config.retry_inflation);
    let ceiling = RateCeiling::select(&snapshot, &estimate);

    tracing::debug!(
        units,
        batch_size,
        base_requests = estimate.base_requests,
        total_requests = estimate.total_requests,
        "Request estimate"
    );

    RateGovernor::new(&ceiling, max_concurrency)
}

/// Requests of `layers` whole-collection fetches
///
/// Each layer costs one national count, then one count and at least one
/// page per province.
pub fn collection_requests(layers: usize) -> usize {
    layers * (1 + 2 * PROVINCES.len())
}

/// Reads the quota and builds a governor for fetching `layers` whole
/// collections
pub async fn plan_fetch_governor(
    api: &dyn GeorefApi,
    layers: usize,
    config: &RateConfig,
    max_concurrency: usize,
) -> RateGovernor {
    plan_governor(api, collection_requests(layers), 1, config, max_concurrency).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeApi;

    #[test]
    fn test_collection_requests() {
        assert_eq!(collection_requests(0), 0);
        assert_eq!(collection_requests(1), 49);
        assert_eq!(collection_requests(7), 343);
    }

    #[tokio::test]
    async fn test_fetch_governor_follows_reported_quota() {
        let api = FakeApi::new().with_quota(&[
            ("x-ratelimit-limit-second", "10"),
            ("x-ratelimit-remaining-second", "10"),
            ("x-ratelimit-limit-minute", "600"),
            ("x-ratelimit-remaining-minute", "500"),
        ]);
        let config = RateConfig {
            retry_inflation: 0.6,
            ..RateConfig::default()
        };

        let governor = plan_fetch_governor(&api, 1, &config, 8).await;

        // 49 requests + 30 for retries do not fit the second window
        let rps = governor.requests_per_second().unwrap();
        assert!((rps - 79.0 / 60.0).abs() < 1e-9);
        assert_eq!(api.requests(), 1);
    }
}
