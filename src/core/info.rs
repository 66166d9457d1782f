//! Deployment summary
//!
//! Fetches every layer of one deployment and reports totals plus the number
//! of records of each layer per province.

use crate::adapters::georef::GeorefApi;
use crate::core::fetch::{fetch_collection, FetchSettings, PartitionFailure};
use crate::core::rate::RateGovernor;
use crate::domain::{province, EntityType, KeyedCollection, RegionFilter, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Counts of one province
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvinceInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nombre: Option<String>,
    /// Records of each layer located in the province
    #[serde(flatten)]
    pub counts: BTreeMap<EntityType, usize>,
}

/// Summary of a deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InfoSummary {
    pub base_url: String,
    pub generated_at: DateTime<Utc>,
    pub totals: BTreeMap<EntityType, usize>,
    /// Keyed by province id
    pub provinces: BTreeMap<String, ProvinceInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<PartitionFailure>,
}

impl InfoSummary {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            generated_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Adds one fetched layer
    ///
    /// Provinces are taken from the `provincias` layer; records of other
    /// layers count toward the province in their `provincia.id`.
    pub fn add_layer(&mut self, entity: EntityType, collection: &KeyedCollection) {
        self.totals.insert(entity, collection.len());

        for (id, record) in collection.iter() {
            if entity == EntityType::Provinces {
                let info = self.provinces.entry(id.to_string()).or_default();
                info.nombre = record
                    .get("nombre")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                continue;
            }

            let Some(code) = record
                .get("provincia")
                .and_then(|p| p.get("id"))
                .and_then(Value::as_str)
            else {
                tracing::debug!(entity = %entity, id = %id, "Record without province");
                continue;
            };

            let info = self
                .provinces
                .entry(code.to_string())
                .or_insert_with(|| ProvinceInfo {
                    nombre: province(code).map(|p| p.name.to_string()),
                    ..Default::default()
                });
            *info.counts.entry(entity).or_default() += 1;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Fetches all seven layers of a deployment and summarizes them
///
/// # Errors
///
/// Fails when the deployment is unreachable or on cancellation; partition
/// failures are kept in [`InfoSummary::failures`].
pub async fn collect_info(
    api: &dyn GeorefApi,
    settings: &FetchSettings,
    governor: &RateGovernor,
) -> Result<InfoSummary> {
    let mut summary = InfoSummary::new(api.base_url());

    for entity in EntityType::ALL {
        let outcome =
            fetch_collection(api, entity, &RegionFilter::National, settings, governor).await?;
        summary.add_layer(entity, &outcome.collection);
        summary.failures.extend(outcome.failures);
    }

    tracing::info!(
        base_url = %summary.base_url,
        provinces = summary.provinces.len(),
        failures = summary.failures.len(),
        "Summary ready"
    );

    Ok(summary)
}
