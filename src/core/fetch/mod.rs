//! Bulk collection fetching
//!
//! [`fetch_collection`] retrieves a complete entity collection from one
//! deployment:
//!
//! 1. **Count**: one basic request reads the collection's `total`
//! 2. **Plan**: direct layers that fit under the page cap are one partition;
//!    everything else is split by province, and by department for provinces
//!    over the cap
//! 3. **Fetch**: partitions run concurrently under the rate governor, with
//!    retry and offset paging
//! 4. **Merge**: partial results are merged by id in submission order
//!
//! Failures of single partitions are returned as data in
//! [`FetchOutcome::failures`]; an unreachable deployment is an error.

pub mod orchestrator;
pub mod partition;
pub mod retry;

pub use orchestrator::{run, MergedResults, PartitionResult};
pub use partition::{plan_partitions, PartitionPlan};
pub use retry::call_with_retry;

use crate::adapters::georef::{FetchTask, GeorefApi};
use crate::config::{FetchConfig, RetryConfig};
use crate::core::rate::RateGovernor;
use crate::domain::{ApiError, EntityType, FetchStrategy, KeyedCollection, RegionFilter, Result};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Tuning of one fetch run
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Largest `max` sent with one request
    pub page_cap: usize,
    pub max_concurrency: usize,
    pub fail_fast: bool,
    /// Largest `max + inicio` the API serves
    pub max_pagination_window: usize,
    pub retry: RetryConfig,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl FetchSettings {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            page_cap: config.page_cap,
            max_concurrency: config.max_concurrency,
            fail_fast: config.fail_fast,
            max_pagination_window: config.max_pagination_window,
            retry: config.retry.clone(),
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// A partition that could not be fetched completely
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionFailure {
    pub entity: EntityType,
    /// `national`, `provincia[06]` or `departamento[06007]`
    pub partition: String,
    /// Region whose records may be missing
    #[serde(skip)]
    pub scope: RegionFilter,
    /// HTTP status when the API answered
    pub status: Option<u16>,
    pub reason: String,
}

impl PartitionFailure {
    pub fn from_api(entity: EntityType, filter: &RegionFilter, error: &ApiError) -> Self {
        Self {
            entity,
            partition: filter.to_string(),
            scope: filter.clone(),
            status: error.status(),
            reason: error.to_string(),
        }
    }

    /// A partition that answered but could not be covered
    pub fn incomplete(entity: EntityType, filter: &RegionFilter, reason: String) -> Self {
        Self {
            entity,
            partition: filter.to_string(),
            scope: filter.clone(),
            status: None,
            reason,
        }
    }
}

impl fmt::Display for PartitionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.entity, self.partition, self.reason)
    }
}

/// Complete result of a collection fetch
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub entity: EntityType,
    pub collection: KeyedCollection,
    pub failures: Vec<PartitionFailure>,
    /// `total` reported by the counting request
    pub expected: usize,
    /// Ids seen in more than one partition
    pub overwritten: usize,
}

impl FetchOutcome {
    fn empty(entity: EntityType) -> Self {
        Self {
            entity,
            collection: KeyedCollection::new(),
            failures: Vec::new(),
            expected: 0,
            overwritten: 0,
        }
    }

    /// Whether every partition was fetched
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetches the whole collection of `entity` within `filter`
///
/// # Errors
///
/// - `GeorefError::Api` when the counting request cannot reach the
///   deployment at all
/// - `GeorefError::Partition` on the first partition failure when
///   `settings.fail_fast` is set
/// - `GeorefError::Cancelled` on shutdown
///
/// # Example
///
/// ```no_run
/// use georef::adapters::georef::GeorefClient;
/// use georef::config::ApiConfig;
/// use georef::core::fetch::{fetch_collection, FetchSettings};
/// use georef::core::rate::RateGovernor;
/// use georef::domain::{EntityType, RegionFilter};
///
/// # async fn example() -> georef::domain::Result<()> {
/// let client = GeorefClient::new(&ApiConfig::default())?;
/// let settings = FetchSettings::default();
/// let governor = RateGovernor::unthrottled(settings.max_concurrency);
///
/// let outcome = fetch_collection(
///     &client,
///     EntityType::Departments,
///     &RegionFilter::National,
///     &settings,
///     &governor,
/// )
/// .await?;
/// println!("{} departments", outcome.collection.len());
/// # Ok(())
/// # }
/// ```
pub async fn fetch_collection(
    api: &dyn GeorefApi,
    entity: EntityType,
    filter: &RegionFilter,
    settings: &FetchSettings,
    governor: &RateGovernor,
) -> Result<FetchOutcome> {
    let start = Instant::now();
    crate::log_fetch_start!(entity, api.base_url());

    let mut outcome = FetchOutcome::empty(entity);

    let count = call_with_retry(governor, &settings.retry, || api.count(entity, filter)).await?;
    let total = match count {
        Ok(total) => total,
        Err(e) if e.is_unreachable() => return Err(e.into()),
        Err(e) => {
            if settings.fail_fast {
                return Err(crate::domain::GeorefError::Partition(e.to_string()));
            }
            outcome
                .failures
                .push(PartitionFailure::from_api(entity, filter, &e));
            crate::log_fetch_complete!(entity, 0, outcome.failures.len(), start.elapsed());
            return Ok(outcome);
        }
    };
    outcome.expected = total;

    if total == 0 {
        crate::log_fetch_complete!(entity, 0, 0, start.elapsed());
        return Ok(outcome);
    }

    let direct = entity.fetch_strategy() == FetchStrategy::Direct && total <= settings.page_cap;
    let partitions = if direct || matches!(filter, RegionFilter::Department(_)) {
        vec![filter.clone()]
    } else {
        let plan = plan_partitions(api, entity, filter, settings, governor).await?;
        if settings.fail_fast {
            if let Some(failure) = plan.failures.first() {
                return Err(crate::domain::GeorefError::Partition(failure.to_string()));
            }
        }
        outcome.failures.extend(plan.failures);
        plan.partitions
    };

    tracing::debug!(
        entity = %entity,
        total,
        partitions = partitions.len(),
        "Fetching partitions"
    );

    let tasks = partitions
        .into_iter()
        .map(|partition| FetchTask::full(entity, partition, settings.page_cap))
        .collect();
    let merged = run(api, tasks, settings, governor).await?;

    outcome.collection = merged.collection;
    outcome.overwritten = merged.overwritten;
    outcome.failures.extend(merged.failures);

    if merged.rejected > 0 {
        tracing::warn!(entity = %entity, rejected = merged.rejected, "Records without id skipped");
    }
    if outcome.is_complete() && outcome.collection.len() != total {
        tracing::warn!(
            entity = %entity,
            expected = total,
            fetched = outcome.collection.len(),
            "Fetched record count differs from reported total"
        );
    }

    crate::log_fetch_complete!(
        entity,
        outcome.collection.len(),
        outcome.failures.len(),
        start.elapsed()
    );

    Ok(outcome)
}
