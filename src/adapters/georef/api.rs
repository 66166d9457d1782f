//! Georef API trait definition
//!
//! `GeorefApi` abstracts one API deployment. The fetch, rate and normalize
//! machinery only talk to this trait, so the same code drives the HTTP
//! client and the in-memory deployments used in tests.

use super::models::{
    AddressMatches, AddressQuery, ApiResult, CollectionPage, FetchTask, NameQuery, PointQuery,
};
use crate::domain::{EntityType, RegionFilter};
use serde_json::Value;
use async_trait::async_trait;
use std::collections::HashMap;

/// Trait for Georef API deployments
///
/// Implementations perform exactly one request per call and never retry;
/// retry policy belongs to the orchestrator.
///
/// # Example
///
/// ```no_run
/// use georef::adapters::georef::{FetchTask, GeorefApi, GeorefClient};
/// use georef::config::ApiConfig;
/// use georef::domain::{EntityType, RegionFilter};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = GeorefClient::new(&ApiConfig::default())?;
///
/// let total = client.count(EntityType::Provinces, &RegionFilter::National).await?;
/// let page = client
///     .fetch_page(&FetchTask::full(EntityType::Provinces, RegionFilter::National, total))
///     .await?;
/// println!("Fetched {} provinces", page.records.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait GeorefApi: Send + Sync {
    /// Base URL of the deployment, with trailing slash
    fn base_url(&self) -> &str;

    /// Fetch one page of an entity collection
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx status, or a body
    /// without the entity's records array.
    async fn fetch_page(&self, task: &FetchTask) -> ApiResult<CollectionPage>;

    /// Number of records of `entity` within `filter`
    ///
    /// Requests a single basic record and reads the reported `total`.
    async fn count(&self, entity: EntityType, filter: &RegionFilter) -> ApiResult<usize> {
        let page = self
            .fetch_page(&FetchTask::count(entity, filter.clone()))
            .await?;
        Ok(page.total)
    }

    /// `x-ratelimit-*` headers of a cheap probe request
    ///
    /// Header names are lowercase. A deployment without quota headers
    /// returns an empty map.
    async fn quota_headers(&self) -> ApiResult<HashMap<String, String>>;

    /// Normalize several addresses with one bulk request
    ///
    /// The result holds one entry per query, in query order, when the
    /// deployment behaves; callers must check the length.
    async fn normalize_bulk(&self, queries: &[AddressQuery]) -> ApiResult<Vec<AddressMatches>>;

    /// Normalize one address
    async fn normalize_one(&self, query: &AddressQuery) -> ApiResult<AddressMatches>;

    /// Best record of `entity` for each name, with one bulk request
    ///
    /// `None` marks a name without match. Callers must check the length.
    async fn similar_bulk(
        &self,
        entity: EntityType,
        queries: &[NameQuery],
    ) -> ApiResult<Vec<Option<Value>>>;

    /// Territorial units containing each point, with one bulk request
    ///
    /// `None` marks a point outside every unit. Callers must check the
    /// length.
    async fn locate_bulk(&self, points: &[PointQuery]) -> ApiResult<Vec<Option<Value>>>;
}
