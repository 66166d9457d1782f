//! Entity layers exposed by the Georef API

use super::errors::GeorefError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a layer's collection is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// One full-payload page, as long as the total fits under the page cap.
    /// Falls back to region partitioning when it does not.
    Direct,
    /// Always partitioned by province, and by department for provinces
    /// over the page cap
    ByRegion,
}

/// One of the seven geographic layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "provincias")]
    Provinces,
    #[serde(rename = "departamentos")]
    Departments,
    #[serde(rename = "municipios")]
    Municipalities,
    #[serde(rename = "localidades-censales")]
    CensusLocalities,
    #[serde(rename = "asentamientos")]
    Settlements,
    #[serde(rename = "localidades")]
    Localities,
    #[serde(rename = "calles")]
    Streets,
}

impl EntityType {
    /// All layers, in the order the API documents them
    pub const ALL: [EntityType; 7] = [
        EntityType::Provinces,
        EntityType::Departments,
        EntityType::Municipalities,
        EntityType::CensusLocalities,
        EntityType::Settlements,
        EntityType::Localities,
        EntityType::Streets,
    ];

    /// URL path segment (`localidades-censales`)
    pub fn endpoint(&self) -> &'static str {
        match self {
            EntityType::Provinces => "provincias",
            EntityType::Departments => "departamentos",
            EntityType::Municipalities => "municipios",
            EntityType::CensusLocalities => "localidades-censales",
            EntityType::Settlements => "asentamientos",
            EntityType::Localities => "localidades",
            EntityType::Streets => "calles",
        }
    }

    /// Key of the record array in a response body (`localidades_censales`)
    pub fn collection_key(&self) -> &'static str {
        match self {
            EntityType::CensusLocalities => "localidades_censales",
            other => other.endpoint(),
        }
    }

    /// Default retrieval strategy
    ///
    /// Settlements and streets are known to exceed the page cap nationally.
    pub fn fetch_strategy(&self) -> FetchStrategy {
        match self {
            EntityType::Settlements | EntityType::Streets => FetchStrategy::ByRegion,
            _ => FetchStrategy::Direct,
        }
    }

    /// Layer names accepted on the command line
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|e| e.endpoint()).collect()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

impl FromStr for EntityType {
    type Err = GeorefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.endpoint() == normalized)
            .ok_or_else(|| {
                GeorefError::UnknownEntity(format!(
                    "{s}. Supported layers: {}",
                    Self::names().join(", ")
                ))
            })
    }
}
