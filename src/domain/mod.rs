//! Domain models and types for georef.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Entity layers** ([`EntityType`]) and their retrieval strategy ([`FetchStrategy`])
//! - **Identifiers** ([`EntityId`]) normalized across string/integer ids
//! - **Keyed collections** ([`KeyedCollection`]) with deterministic merge
//! - **Regions** ([`PROVINCES`], [`RegionFilter`])
//! - **Error types** ([`GeorefError`], [`ApiError`]) and the [`Result`] alias
//!
//! # Example
//!
//! ```rust
//! use georef::domain::{EntityType, KeyedCollection};
//! use serde_json::json;
//!
//! # fn example() -> georef::domain::Result<()> {
//! let entity: EntityType = "localidades-censales".parse()?;
//! assert_eq!(entity.collection_key(), "localidades_censales");
//!
//! let (collection, rejected) = KeyedCollection::from_records(vec![json!({"id": "02"})]);
//! assert_eq!(collection.len(), 1);
//! assert!(rejected.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod entity;
pub mod errors;
pub mod ids;
pub mod region;
pub mod result;

pub use collection::KeyedCollection;
pub use entity::{EntityType, FetchStrategy};
pub use errors::{ApiError, GeorefError};
pub use ids::EntityId;
pub use region::{province, Province, RegionFilter, RegionRef, PROVINCES};
pub use result::Result;
