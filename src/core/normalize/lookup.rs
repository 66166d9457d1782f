//! Bulk name and location lookups
//!
//! Names are matched against one entity layer through `POST <layer>` and
//! points are resolved to their territorial units through
//! `POST ubicacion`. Like address normalization, every input ends in one
//! [`RowOutcome`] and a failed or short bulk request degrades to
//! single-element requests.

use super::{NormalizeSettings, RowOutcome};
use crate::adapters::georef::{ApiResult, GeorefApi, NameQuery, PointQuery};
use crate::core::fetch::call_with_retry;
use crate::core::rate::RateGovernor;
use crate::domain::{EntityType, GeorefError, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Queries of one bulk request
#[derive(Debug, Clone)]
enum LookupBatch {
    Names(EntityType, Vec<NameQuery>),
    Points(Vec<PointQuery>),
}

impl LookupBatch {
    fn len(&self) -> usize {
        match self {
            LookupBatch::Names(_, queries) => queries.len(),
            LookupBatch::Points(points) => points.len(),
        }
    }

    async fn send(&self, api: &dyn GeorefApi) -> ApiResult<Vec<Option<Value>>> {
        match self {
            LookupBatch::Names(entity, queries) => api.similar_bulk(*entity, queries).await,
            LookupBatch::Points(points) => api.locate_bulk(points).await,
        }
    }

    /// Splits into request batches of at most `size` queries
    fn split(self, size: usize) -> Vec<LookupBatch> {
        match self {
            LookupBatch::Names(entity, queries) => queries
                .chunks(size)
                .map(|chunk| LookupBatch::Names(entity, chunk.to_vec()))
                .collect(),
            LookupBatch::Points(points) => points
                .chunks(size)
                .map(|chunk| LookupBatch::Points(chunk.to_vec()))
                .collect(),
        }
    }
}

/// Resolves names and points against one deployment
pub struct BatchLookup<'a> {
    api: &'a dyn GeorefApi,
    governor: &'a RateGovernor,
    settings: NormalizeSettings,
    processed: AtomicUsize,
}

impl<'a> BatchLookup<'a> {
    pub fn new(api: &'a dyn GeorefApi, governor: &'a RateGovernor, settings: NormalizeSettings) -> Self {
        Self {
            api,
            governor,
            settings,
            processed: AtomicUsize::new(0),
        }
    }

    /// Inputs completed so far, across every call
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// Best record of `entity` for each name, in input order
    ///
    /// Blank names are not sent and end as errors.
    ///
    /// # Errors
    ///
    /// Only cancellation is an error.
    pub async fn similar(&self, entity: EntityType, names: Vec<String>) -> Result<Vec<RowOutcome>> {
        let mut outcomes = Vec::with_capacity(names.len());
        let mut queries = Vec::new();
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                outcomes.push(Some(RowOutcome::invalid(GeorefError::Validation(
                    "empty name".to_string(),
                ))));
            } else {
                outcomes.push(None);
                queries.push(NameQuery::new(name));
            }
        }

        self.resolve(outcomes, LookupBatch::Names(entity, queries))
            .await
    }

    /// Territorial units containing each point, in input order
    ///
    /// Points with non-finite or out of range coordinates are not sent and
    /// end as errors.
    ///
    /// # Errors
    ///
    /// Only cancellation is an error.
    pub async fn locate(&self, points: Vec<PointQuery>) -> Result<Vec<RowOutcome>> {
        let mut outcomes = Vec::with_capacity(points.len());
        let mut valid = Vec::new();
        for point in points {
            if point.is_valid() {
                outcomes.push(None);
                valid.push(point);
            } else {
                outcomes.push(Some(RowOutcome::invalid(GeorefError::Validation(format!(
                    "invalid coordinates ({}, {})",
                    point.lat, point.lon
                )))));
            }
        }

        self.resolve(outcomes, LookupBatch::Points(valid)).await
    }

    /// Fills the empty slots of `outcomes` with the answers to `pending`
    async fn resolve(
        &self,
        outcomes: Vec<Option<RowOutcome>>,
        pending: LookupBatch,
    ) -> Result<Vec<RowOutcome>> {
        let rejected = outcomes.iter().filter(|o| o.is_some()).count();
        let batches = pending.split(self.settings.batch_size.max(1));

        let answers: Vec<Vec<RowOutcome>> = stream::iter(batches)
            .map(|batch| self.send_batch(batch))
            .buffered(self.settings.max_concurrency.max(1))
            .try_collect()
            .await?;
        self.processed.fetch_add(rejected, Ordering::Relaxed);

        let mut answers = answers.into_iter().flatten();
        Ok(outcomes
            .into_iter()
            .map(|outcome| {
                outcome
                    .or_else(|| answers.next())
                    .unwrap_or(RowOutcome::NotFound)
            })
            .collect())
    }

    async fn send_batch(&self, batch: LookupBatch) -> Result<Vec<RowOutcome>> {
        let bulk = call_with_retry(self.governor, &self.settings.retry, || {
            batch.send(self.api)
        })
        .await?;

        let outcomes = match bulk {
            Ok(results) if results.len() == batch.len() => {
                results.into_iter().map(RowOutcome::from_best).collect()
            }
            other if batch.len() > 1 => {
                let reason = match other {
                    Ok(results) => mismatch(results.len(), batch.len()),
                    Err(e) => e.to_string(),
                };
                tracing::warn!(
                    queries = batch.len(),
                    reason = %reason,
                    "Bulk lookup failed, falling back to single requests"
                );

                stream::iter(batch.clone().split(1))
                    .map(|single| self.send_single(single))
                    .buffered(self.settings.max_concurrency.max(1))
                    .try_collect()
                    .await?
            }
            Ok(results) => vec![RowOutcome::Errored {
                status: None,
                reason: mismatch(results.len(), 1),
            }],
            Err(e) => vec![RowOutcome::from_error(&e)],
        };

        self.processed.fetch_add(batch.len(), Ordering::Relaxed);
        Ok(outcomes)
    }

    async fn send_single(&self, single: LookupBatch) -> Result<RowOutcome> {
        let result = call_with_retry(self.governor, &self.settings.retry, || {
            single.send(self.api)
        })
        .await?;

        Ok(match result {
            Ok(mut results) if results.len() == 1 => RowOutcome::from_best(results.pop().flatten()),
            Ok(results) => RowOutcome::Errored {
                status: None,
                reason: mismatch(results.len(), 1),
            },
            Err(e) => RowOutcome::from_error(&e),
        })
    }
}

fn mismatch(results: usize, queries: usize) -> String {
    format!("{results} results for {queries} queries")
}

impl RowOutcome {
    fn from_best(best: Option<Value>) -> Self {
        match best {
            Some(found) => RowOutcome::Normalized(found),
            None => RowOutcome::NotFound,
        }
    }
}
