//! Deployment diff pipeline
//!
//! Fetches a layer from the source and the target deployment concurrently
//! and diffs the two collections with the layer's rules.
//!
//! Ids inside a partition that failed on either side cannot be told apart
//! from real additions or removals, so they are withheld from `added` and
//! `removed` and counted in [`LayerDiff::withheld`].

use super::engine::{diff, DiffResult};
use super::rules::DiffRules;
use crate::adapters::georef::GeorefApi;
use crate::core::fetch::{fetch_collection, FetchOutcome, FetchSettings};
use crate::core::rate::RateGovernor;
use crate::domain::{EntityId, EntityType, KeyedCollection, RegionFilter, Result};
use std::time::Instant;

/// Both sides of one layer and their differences
#[derive(Debug, Clone)]
pub struct LayerDiff {
    pub entity: EntityType,
    pub source_url: String,
    pub target_url: String,
    pub source: FetchOutcome,
    pub target: FetchOutcome,
    pub result: DiffResult,
    /// Added or removed ids left out because their region failed to fetch
    pub withheld: usize,
}

impl LayerDiff {
    /// Whether both sides were fetched without partition failures
    pub fn is_complete(&self) -> bool {
        self.source.is_complete() && self.target.is_complete()
    }
}

/// Source and target deployments plus the shared fetch machinery
pub struct DiffPipeline<'a> {
    source: &'a dyn GeorefApi,
    target: &'a dyn GeorefApi,
    settings: FetchSettings,
    governor: &'a RateGovernor,
    extra_patterns: Vec<String>,
}

impl<'a> DiffPipeline<'a> {
    pub fn new(
        source: &'a dyn GeorefApi,
        target: &'a dyn GeorefApi,
        settings: FetchSettings,
        governor: &'a RateGovernor,
    ) -> Self {
        Self {
            source,
            target,
            settings,
            governor,
            extra_patterns: Vec::new(),
        }
    }

    /// Exclusion patterns applied on top of every layer's defaults
    pub fn with_exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.extra_patterns = patterns;
        self
    }

    /// Fetches and diffs one layer
    ///
    /// # Errors
    ///
    /// Fails when either deployment is unreachable, on an invalid exclusion
    /// pattern, and on the fetch errors of [`fetch_collection`].
    pub async fn diff_layer(&self, entity: EntityType) -> Result<LayerDiff> {
        let start = Instant::now();
        let options = DiffRules::for_entity(entity)
            .with_patterns(&self.extra_patterns)
            .compile()?;

        let (source, target) = futures::try_join!(
            fetch_collection(
                self.source,
                entity,
                &RegionFilter::National,
                &self.settings,
                self.governor
            ),
            fetch_collection(
                self.target,
                entity,
                &RegionFilter::National,
                &self.settings,
                self.governor
            ),
        )?;

        tracing::info!(
            entity = %entity,
            source_registers = source.collection.len(),
            target_registers = target.collection.len(),
            "Collections fetched"
        );

        let mut result = diff(&source.collection, &target.collection, &options);
        let gaps: Vec<&RegionFilter> = source
            .failures
            .iter()
            .chain(&target.failures)
            .map(|failure| &failure.scope)
            .collect();
        let withheld =
            withhold_uncovered(&mut result, &source.collection, &target.collection, &gaps);
        if withheld > 0 {
            tracing::warn!(
                entity = %entity,
                withheld,
                failed_partitions = gaps.len(),
                "Added/removed ids inside failed partitions withheld"
            );
        }

        tracing::info!(
            entity = %entity,
            added = result.added.len(),
            removed = result.removed.len(),
            changed = result.changed_ids().len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Diff computed"
        );

        Ok(LayerDiff {
            entity,
            source_url: self.source.base_url().to_string(),
            target_url: self.target.base_url().to_string(),
            source,
            target,
            result,
            withheld,
        })
    }
}

/// Drops added and removed ids whose record lies in one of `gaps`
///
/// Returns the number of ids dropped.
fn withhold_uncovered(
    result: &mut DiffResult,
    source: &KeyedCollection,
    target: &KeyedCollection,
    gaps: &[&RegionFilter],
) -> usize {
    if gaps.is_empty() {
        return 0;
    }
    let in_gap = |collection: &KeyedCollection, id: &EntityId| {
        collection
            .get(id)
            .is_some_and(|record| gaps.iter().any(|gap| gap.covers(record)))
    };

    let before = result.added.len() + result.removed.len();
    result.added.retain(|id| !in_gap(target, id));
    result.removed.retain(|id| !in_gap(source, id));
    before - result.added.len() - result.removed.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::domain::{ApiError, EntityId, GeorefError};
    use crate::test_support::FakeApi;
    use serde_json::json;

    fn settings() -> FetchSettings {
        FetchSettings {
            retry: RetryConfig {
                max_retries: 0,
                ..Default::default()
            },
            ..FetchSettings::default()
        }
    }

    fn departments(fuente: &str, lat: f64) -> FakeApi {
        FakeApi::new()
            .with_record(
                EntityType::Departments,
                json!({"id": "02007", "nombre": "Comuna 1", "fuente": fuente,
                       "centroide": {"lat": lat}, "provincia": {"id": "02"}}),
            )
            .with_record(
                EntityType::Departments,
                json!({"id": "06007", "nombre": "Adolfo Alsina", "fuente": fuente,
                       "centroide": {"lat": -37.2}, "provincia": {"id": "06"}}),
            )
    }

    #[tokio::test]
    async fn test_identical_deployments_have_empty_diff() {
        let source = departments("IGN", -34.6);
        let target = departments("IGN", -34.6);
        let governor = RateGovernor::unthrottled(4);

        let layer = DiffPipeline::new(&source, &target, settings(), &governor)
            .diff_layer(EntityType::Departments)
            .await
            .unwrap();

        assert!(layer.result.is_empty());
        assert!(layer.is_complete());
        assert_eq!(layer.source.collection.len(), 2);
    }

    #[tokio::test]
    async fn test_layer_rules_exclude_fuente() {
        let source = departments("IGN", -34.6);
        let target = departments("INDEC", -34.9);
        let governor = RateGovernor::unthrottled(4);

        let layer = DiffPipeline::new(&source, &target, settings(), &governor)
            .diff_layer(EntityType::Departments)
            .await
            .unwrap();

        let changes = &layer.result.values_changed[&EntityId::new("02007").unwrap()];
        assert_eq!(changes.keys().collect::<Vec<_>>(), vec!["centroide.lat"]);
    }

    #[tokio::test]
    async fn test_extra_patterns_apply() {
        let source = departments("IGN", -34.6);
        let target = departments("IGN", -34.9);
        let governor = RateGovernor::unthrottled(4);

        let layer = DiffPipeline::new(&source, &target, settings(), &governor)
            .with_exclude_patterns(vec!["^centroide".to_string()])
            .diff_layer(EntityType::Departments)
            .await
            .unwrap();

        assert!(layer.result.is_empty());
    }

    #[tokio::test]
    async fn test_failed_partition_is_not_reported_as_removed() {
        let source = FakeApi::new()
            .with_records(EntityType::Streets, "02", "02007", 2)
            .with_records(EntityType::Streets, "06", "06007", 3);
        let target = FakeApi::new()
            .with_records(EntityType::Streets, "02", "02007", 1)
            .with_records(EntityType::Streets, "06", "06007", 3)
            .failing_province("06");
        let governor = RateGovernor::unthrottled(4);
        let settings = FetchSettings {
            page_cap: 2,
            ..settings()
        };

        let layer = DiffPipeline::new(&source, &target, settings, &governor)
            .diff_layer(EntityType::Streets)
            .await
            .unwrap();

        assert!(!layer.is_complete());
        assert_eq!(layer.target.failures[0].partition, "provincia[06]");
        // Only the real removal in province 02 is reported
        assert_eq!(layer.result.removed, vec![EntityId::new("02007-00001").unwrap()]);
        assert!(layer.result.added.is_empty());
        assert_eq!(layer.withheld, 3);
    }

    #[tokio::test]
    async fn test_failed_count_withholds_whole_layer() {
        let source = departments("IGN", -34.6);
        let target = departments("IGN", -34.6).failing_national();
        let governor = RateGovernor::unthrottled(4);

        let layer = DiffPipeline::new(&source, &target, settings(), &governor)
            .diff_layer(EntityType::Departments)
            .await
            .unwrap();

        assert!(layer.target.collection.is_empty());
        assert!(!layer.is_complete());
        assert!(layer.result.removed.is_empty());
        assert!(layer.result.is_empty());
        assert_eq!(layer.withheld, 2);
    }

    #[test]
    fn test_withhold_keeps_ids_outside_gaps() {
        let record = |id: &str, province: &str| json!({"id": id, "provincia": {"id": province}});
        let (source, _) = KeyedCollection::from_records(vec![record("1", "02"), record("2", "06")]);
        let (target, _) = KeyedCollection::from_records(vec![record("3", "06")]);
        let options = DiffRules::for_entity(EntityType::Streets).compile().unwrap();
        let mut result = diff(&source, &target, &options);
        let gap = RegionFilter::Province("06".into());

        let withheld = withhold_uncovered(&mut result, &source, &target, &[&gap]);

        assert_eq!(withheld, 2);
        assert_eq!(result.removed, vec![EntityId::new("1").unwrap()]);
        assert!(result.added.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_target_fails_layer() {
        let source = departments("IGN", -34.6);
        let target = FakeApi::new().unreachable();
        let governor = RateGovernor::unthrottled(4);

        let err = DiffPipeline::new(&source, &target, settings(), &governor)
            .diff_layer(EntityType::Departments)
            .await
            .unwrap_err();

        assert!(matches!(err, GeorefError::Api(ApiError::ConnectionFailed { .. })));
    }
}
