//! Georef API adapter
//!
//! This module provides the `GeorefApi` trait, its reqwest implementation
//! and the request/response models shared by both.

pub mod api;
pub mod client;
pub mod models;

pub use api::GeorefApi;
pub use client::GeorefClient;
pub use models::{
    best_results, AddressMatches, AddressQuery, ApiResult, CollectionPage, FetchTask, FieldSet,
    NameQuery, PointQuery, QueryOptions,
};
