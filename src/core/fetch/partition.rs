//! Region partitioning
//!
//! Splits a collection into region-scoped partitions small enough to fetch
//! with a single full-payload page: one partition per province, or one per
//! department for provinces whose count exceeds the page cap.

use super::retry::call_with_retry;
use super::{FetchSettings, PartitionFailure};
use crate::adapters::georef::{FetchTask, GeorefApi};
use crate::core::rate::RateGovernor;
use crate::domain::{EntityId, EntityType, Province, RegionFilter, Result, PROVINCES};
use futures::stream::{self, StreamExt, TryStreamExt};

/// Partitions planned for one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionPlan {
    /// In province table order, then department id order
    pub partitions: Vec<RegionFilter>,
    pub failures: Vec<PartitionFailure>,
}

impl PartitionPlan {
    fn extend(&mut self, other: PartitionPlan) {
        self.partitions.extend(other.partitions);
        self.failures.extend(other.failures);
    }
}

/// Plans the partitions covering `entity` within `scope`
///
/// A national scope visits all 24 provinces; a province scope only that
/// province; a department scope is already a partition. Count requests run
/// concurrently but the plan keeps province order.
pub async fn plan_partitions(
    api: &dyn GeorefApi,
    entity: EntityType,
    scope: &RegionFilter,
    settings: &FetchSettings,
    governor: &RateGovernor,
) -> Result<PartitionPlan> {
    let provinces: Vec<&str> = match scope {
        RegionFilter::Department(_) => {
            return Ok(PartitionPlan {
                partitions: vec![scope.clone()],
                failures: Vec::new(),
            })
        }
        RegionFilter::Province(code) => vec![code.as_str()],
        RegionFilter::National => PROVINCES.iter().map(|p: &Province| p.code).collect(),
    };

    let plans: Vec<PartitionPlan> = stream::iter(provinces)
        .map(|code| plan_province(api, entity, code, settings, governor))
        .buffered(settings.max_concurrency.max(1))
        .try_collect()
        .await?;

    let mut plan = PartitionPlan::default();
    for province_plan in plans {
        plan.extend(province_plan);
    }

    tracing::debug!(
        entity = %entity,
        scope = %scope,
        partitions = plan.partitions.len(),
        failures = plan.failures.len(),
        "Partition plan ready"
    );

    Ok(plan)
}

/// Plans one province
///
/// Failures of the count or the department listing become part of the
/// plan; only cancellation is an error.
async fn plan_province(
    api: &dyn GeorefApi,
    entity: EntityType,
    code: &str,
    settings: &FetchSettings,
    governor: &RateGovernor,
) -> Result<PartitionPlan> {
    let province = RegionFilter::Province(code.to_string());
    let mut plan = PartitionPlan::default();

    let count = call_with_retry(governor, &settings.retry, || api.count(entity, &province)).await?;
    let total = match count {
        Ok(total) => total,
        Err(e) => {
            tracing::warn!(entity = %entity, province = code, error = %e, "Province count failed");
            plan.failures
                .push(PartitionFailure::from_api(entity, &province, &e));
            return Ok(plan);
        }
    };

    if total == 0 {
        return Ok(plan);
    }

    if total <= settings.page_cap {
        plan.partitions.push(province);
        return Ok(plan);
    }

    tracing::debug!(
        entity = %entity,
        province = code,
        total,
        page_cap = settings.page_cap,
        "Province exceeds page cap, splitting by department"
    );

    let listing = FetchTask::department_ids(code, settings.page_cap);
    let page = call_with_retry(governor, &settings.retry, || api.fetch_page(&listing)).await?;
    match page {
        Ok(page) => {
            let mut ids: Vec<EntityId> = Vec::with_capacity(page.records.len());
            for record in &page.records {
                match EntityId::from_record(record) {
                    Ok(id) => ids.push(id),
                    Err(e) => tracing::warn!(province = code, error = %e, "Skipping department"),
                }
            }
            ids.sort();
            ids.dedup();
            plan.partitions.extend(
                ids.into_iter()
                    .map(|id| RegionFilter::Department(id.into_inner())),
            );
        }
        Err(e) => {
            tracing::warn!(
                entity = %entity,
                province = code,
                error = %e,
                "Department listing failed"
            );
            plan.failures
                .push(PartitionFailure::from_api(entity, &province, &e));
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeApi;

    fn settings(page_cap: usize) -> FetchSettings {
        FetchSettings {
            page_cap,
            ..FetchSettings::default()
        }
    }

    #[tokio::test]
    async fn test_small_provinces_are_single_partitions() {
        let api = FakeApi::new()
            .with_records(EntityType::Streets, "02", "02001", 3)
            .with_records(EntityType::Streets, "06", "06007", 2);
        let governor = RateGovernor::unthrottled(4);

        let plan = plan_partitions(
            &api,
            EntityType::Streets,
            &RegionFilter::National,
            &settings(10),
            &governor,
        )
        .await
        .unwrap();

        assert_eq!(
            plan.partitions,
            vec![
                RegionFilter::Province("02".into()),
                RegionFilter::Province("06".into())
            ]
        );
        assert!(plan.failures.is_empty());
    }

    #[tokio::test]
    async fn test_large_province_is_split_by_department() {
        let api = FakeApi::new()
            .with_records(EntityType::Streets, "06", "06014", 4)
            .with_records(EntityType::Streets, "06", "06007", 4)
            .with_records(EntityType::Streets, "14", "14007", 2);
        let governor = RateGovernor::unthrottled(4);

        let plan = plan_partitions(
            &api,
            EntityType::Streets,
            &RegionFilter::National,
            &settings(5),
            &governor,
        )
        .await
        .unwrap();

        assert_eq!(
            plan.partitions,
            vec![
                RegionFilter::Department("06007".into()),
                RegionFilter::Department("06014".into()),
                RegionFilter::Province("14".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_province_count_is_recorded_and_planning_continues() {
        let api = FakeApi::new()
            .with_records(EntityType::Settlements, "02", "02001", 1)
            .with_records(EntityType::Settlements, "10", "10007", 1)
            .failing_province("06");
        let governor = RateGovernor::unthrottled(4);

        let plan = plan_partitions(
            &api,
            EntityType::Settlements,
            &RegionFilter::National,
            &FetchSettings {
                retry: crate::config::RetryConfig {
                    max_retries: 0,
                    ..Default::default()
                },
                ..settings(10)
            },
            &governor,
        )
        .await
        .unwrap();

        assert_eq!(plan.partitions.len(), 2);
        assert_eq!(plan.failures.len(), 1);
        assert_eq!(plan.failures[0].partition, "provincia[06]");
    }

    #[tokio::test]
    async fn test_department_scope_is_its_own_partition() {
        let api = FakeApi::new();
        let governor = RateGovernor::unthrottled(1);
        let scope = RegionFilter::Department("06007".into());

        let plan = plan_partitions(&api, EntityType::Streets, &scope, &settings(5), &governor)
            .await
            .unwrap();

        assert_eq!(plan.partitions, vec![scope]);
        assert_eq!(api.requests(), 0);
    }
}
