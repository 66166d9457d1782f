//! Chunked bulk address normalization
//!
//! Inside a chunk, rows are grouped into request batches sent concurrently
//! as `POST direcciones` bodies. A batch whose bulk request fails, or whose
//! response does not have one result per address, degrades to one
//! `GET direcciones` request per row. Both tiers produce the same
//! [`NormalizedRow`] shape.

use super::address::AddressRow;
use super::{NormalizeSettings, NormalizedRow, RowOutcome};
use crate::adapters::georef::{AddressMatches, GeorefApi};
use crate::core::fetch::call_with_retry;
use crate::core::rate::RateGovernor;
use crate::domain::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Normalizes address rows against one deployment
pub struct BatchNormalizer<'a> {
    api: &'a dyn GeorefApi,
    governor: &'a RateGovernor,
    settings: NormalizeSettings,
    processed: AtomicUsize,
}

impl<'a> BatchNormalizer<'a> {
    pub fn new(api: &'a dyn GeorefApi, governor: &'a RateGovernor, settings: NormalizeSettings) -> Self {
        Self {
            api,
            governor,
            settings,
            processed: AtomicUsize::new(0),
        }
    }

    /// Rows completed so far, across every call
    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// Normalizes `rows`, one output row per input row, in input order
    ///
    /// # Errors
    ///
    /// Only cancellation is an error; request failures become
    /// [`RowOutcome::Errored`] rows.
    pub async fn normalize_batch(&self, rows: Vec<AddressRow>) -> Result<Vec<NormalizedRow>> {
        let total = rows.len();
        let mut output = Vec::with_capacity(total);
        let mut rows = rows.into_iter();
        let chunk_size = self.settings.chunk_size.max(1);

        loop {
            let chunk: Vec<AddressRow> = rows.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            let start = output.len();
            output.extend(self.normalize_chunk(start, chunk).await?);
            crate::log_batch_processing!(output.len(), total);
        }

        Ok(output)
    }

    /// Normalizes one chunk whose first row has input position `start`
    pub async fn normalize_chunk(
        &self,
        start: usize,
        rows: Vec<AddressRow>,
    ) -> Result<Vec<NormalizedRow>> {
        let batch_size = self.settings.batch_size.max(1);
        let mut batches = Vec::new();
        let mut rows = rows.into_iter();
        let mut index = start;
        loop {
            let batch: Vec<AddressRow> = rows.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }
            let len = batch.len();
            batches.push((index, batch));
            index += len;
        }

        let mut results: Vec<Vec<NormalizedRow>> = stream::iter(batches)
            .map(|(first, batch)| self.normalize_request_batch(first, batch))
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .try_collect()
            .await?;

        results.sort_by_key(|batch| batch.first().map(|row| row.index));
        Ok(results.into_iter().flatten().collect())
    }

    async fn normalize_request_batch(
        &self,
        first: usize,
        batch: Vec<AddressRow>,
    ) -> Result<Vec<NormalizedRow>> {
        let mut outcomes: Vec<Option<RowOutcome>> = batch
            .iter()
            .map(|row| row.validate().err().map(RowOutcome::invalid))
            .collect();

        let pending: Vec<usize> = (0..batch.len()).filter(|&i| outcomes[i].is_none()).collect();
        let queries: Vec<_> = pending
            .iter()
            .map(|&i| batch[i].to_query(&self.settings.options))
            .collect();

        if !queries.is_empty() {
            let bulk = call_with_retry(self.governor, &self.settings.retry, || {
                self.api.normalize_bulk(&queries)
            })
            .await?;

            match bulk {
                Ok(matches) if matches.len() == queries.len() => {
                    for (&i, found) in pending.iter().zip(matches) {
                        outcomes[i] = Some(RowOutcome::from_matches(found));
                    }
                }
                other => {
                    let reason = match other {
                        Ok(matches) => format!(
                            "{} results for {} addresses",
                            matches.len(),
                            queries.len()
                        ),
                        Err(e) => e.to_string(),
                    };
                    tracing::warn!(
                        first_row = first,
                        rows = queries.len(),
                        reason = %reason,
                        "Bulk normalization failed, falling back to single requests"
                    );

                    let singles: Vec<RowOutcome> = stream::iter(&queries)
                        .map(|query| async move {
                            call_with_retry(self.governor, &self.settings.retry, || {
                                self.api.normalize_one(query)
                            })
                            .await
                            .map(|result| match result {
                                Ok(found) => RowOutcome::from_matches(found),
                                Err(e) => RowOutcome::from_error(&e),
                            })
                        })
                        .buffered(self.settings.max_concurrency.max(1))
                        .try_collect()
                        .await?;

                    for (&i, outcome) in pending.iter().zip(singles) {
                        outcomes[i] = Some(outcome);
                    }
                }
            }
        }

        self.processed.fetch_add(batch.len(), Ordering::Relaxed);

        Ok(batch
            .into_iter()
            .zip(outcomes)
            .enumerate()
            .map(|(offset, (address, outcome))| NormalizedRow {
                index: first + offset,
                address,
                outcome: outcome.unwrap_or(RowOutcome::NotFound),
            })
            .collect())
    }
}

impl RowOutcome {
    fn from_matches(matches: AddressMatches) -> Self {
        match matches.direcciones.into_iter().next() {
            Some(best) => RowOutcome::Normalized(best),
            None => RowOutcome::NotFound,
        }
    }
}
