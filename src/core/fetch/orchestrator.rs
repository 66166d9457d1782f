//! Concurrent partition fetching
//!
//! Tasks are dispatched with bounded concurrency through the rate governor.
//! Results are put back in submission order before merging, so the record
//! kept for an id present in two partitions does not depend on timing.

use super::retry::call_with_retry;
use super::{FetchSettings, PartitionFailure};
use crate::adapters::georef::{FetchTask, GeorefApi};
use crate::core::rate::RateGovernor;
use crate::domain::{GeorefError, KeyedCollection, Result};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::pin::pin;

/// Records of one partition, and why it is incomplete if it is
#[derive(Debug, Clone, Default)]
pub struct PartitionResult {
    pub records: Vec<Value>,
    pub failure: Option<PartitionFailure>,
}

/// Merged output of a task set
#[derive(Debug, Clone, Default)]
pub struct MergedResults {
    pub collection: KeyedCollection,
    pub failures: Vec<PartitionFailure>,
    /// Ids seen in more than one partition
    pub overwritten: usize,
    /// Records without a usable id
    pub rejected: usize,
}

/// Fetches every task and merges the records
///
/// All tasks finish before this returns. A failing task becomes a
/// [`PartitionFailure`] unless `settings.fail_fast` is set, in which case
/// the first failure is returned as an error and pending tasks are dropped.
///
/// # Errors
///
/// `GeorefError::Cancelled` on shutdown, `GeorefError::Partition` in
/// fail-fast mode.
pub async fn run(
    api: &dyn GeorefApi,
    tasks: Vec<FetchTask>,
    settings: &FetchSettings,
    governor: &RateGovernor,
) -> Result<MergedResults> {
    let total_tasks = tasks.len();
    let mut completed: Vec<(usize, PartitionResult)> = Vec::with_capacity(total_tasks);

    let mut results = pin!(stream::iter(tasks.into_iter().enumerate())
        .map(|(index, task)| async move {
            (index, fetch_partition(api, &task, settings, governor).await)
        })
        .buffer_unordered(settings.max_concurrency.max(1)));

    while let Some((index, result)) = results.next().await {
        let partition = result?;
        if settings.fail_fast {
            if let Some(failure) = &partition.failure {
                return Err(GeorefError::Partition(failure.to_string()));
            }
        }
        completed.push((index, partition));
        crate::log_batch_processing!(completed.len(), total_tasks);
    }

    completed.sort_by_key(|(index, _)| *index);

    let mut merged = MergedResults::default();
    for (_, partition) in completed {
        let (collection, rejected) = KeyedCollection::from_records(partition.records);
        merged.rejected += rejected.len();
        merged.overwritten += merged.collection.merge(collection);
        merged.failures.extend(partition.failure);
    }

    if merged.overwritten > 0 {
        tracing::debug!(
            overwritten = merged.overwritten,
            "Ids present in several partitions, kept the last submitted"
        );
    }

    Ok(merged)
}

/// Fetches one partition, following offsets while `total` exceeds the rows
/// received
///
/// Pages beyond the pagination window are not requested; the partition is
/// then returned with the rows it has and a failure describing the gap.
pub async fn fetch_partition(
    api: &dyn GeorefApi,
    task: &FetchTask,
    settings: &FetchSettings,
    governor: &RateGovernor,
) -> Result<PartitionResult> {
    let mut result = PartitionResult::default();
    let mut offset = 0;

    loop {
        let window_left = settings.max_pagination_window.saturating_sub(offset);
        let page_task = FetchTask {
            max: task.max.min(window_left),
            ..task.at_offset(offset)
        };

        let page = call_with_retry(governor, &settings.retry, || api.fetch_page(&page_task)).await?;
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    entity = %task.entity,
                    partition = %task.filter,
                    error = %e,
                    "Partition fetch failed"
                );
                result.failure = Some(PartitionFailure::from_api(task.entity, &task.filter, &e));
                return Ok(result);
            }
        };

        let received = page.records.len();
        let total = page.total;
        result.records.extend(page.records);
        offset += received;

        if offset >= total {
            return Ok(result);
        }

        if received == 0 {
            result.failure = Some(PartitionFailure::incomplete(
                task.entity,
                &task.filter,
                format!("empty page at offset {offset} of {total}"),
            ));
            return Ok(result);
        }

        if offset >= settings.max_pagination_window {
            tracing::warn!(
                entity = %task.entity,
                partition = %task.filter,
                total,
                received = offset,
                window = settings.max_pagination_window,
                "Partition exceeds pagination window"
            );
            result.failure = Some(PartitionFailure::incomplete(
                task.entity,
                &task.filter,
                format!(
                    "{total} records exceed the pagination window of {}; {offset} fetched",
                    settings.max_pagination_window
                ),
            ));
            return Ok(result);
        }

        tracing::debug!(
            entity = %task.entity,
            partition = %task.filter,
            offset,
            total,
            "Partition exceeds one page, continuing at offset"
        );
    }
}
