//! Shared helpers for integration tests
//!
//! [`Deployment`] is an in-memory Georef deployment built only on the
//! public API of the crate.

#![allow(dead_code)]

use async_trait::async_trait;
use georef::adapters::georef::{
    AddressMatches, AddressQuery, ApiResult, CollectionPage, FetchTask, FieldSet, GeorefApi,
    NameQuery, PointQuery,
};
use georef::domain::{ApiError, EntityType, RegionFilter, PROVINCES};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct Deployment {
    base_url: String,
    records: HashMap<EntityType, Vec<Value>>,
    quota: HashMap<String, String>,
    addresses: HashMap<String, Value>,
    locations: Vec<(PointQuery, Value)>,
    failing_provinces: HashSet<String>,
    requests: AtomicUsize,
}

impl Deployment {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_records(mut self, entity: EntityType, records: Vec<Value>) -> Self {
        self.records.entry(entity).or_default().extend(records);
        self
    }

    pub fn with_quota(mut self, pairs: &[(&str, &str)]) -> Self {
        self.quota = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    pub fn with_address(mut self, direccion: &str, localidad_censal: &str, best: Value) -> Self {
        self.addresses
            .insert(format!("{direccion}|{localidad_censal}"), best);
        self
    }

    pub fn with_location(mut self, lat: f64, lon: f64, units: Value) -> Self {
        self.locations.push((PointQuery::new(lat, lon), units));
        self
    }

    /// Requests scoped to `code` or one of its departments answer 500
    pub fn failing_province(mut self, code: &str) -> Self {
        self.failing_provinces.insert(code.to_string());
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn lookup(&self, query: &AddressQuery) -> AddressMatches {
        let key = format!(
            "{}|{}",
            query.direccion,
            query.localidad_censal.as_deref().unwrap_or_default()
        );
        AddressMatches {
            direcciones: self.addresses.get(&key).cloned().into_iter().collect(),
        }
    }
}

/// The first `n` provinces, `centroide.lat` set to `lat`
pub fn provinces(n: usize, lat: f64) -> Vec<Value> {
    PROVINCES
        .iter()
        .take(n)
        .map(|p| {
            json!({
                "id": p.code,
                "nombre": p.name,
                "centroide": {"lat": lat, "lon": -58.4},
            })
        })
        .collect()
}

/// `n` streets spread over the departments `<province>007`
pub fn streets(province: &str, n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "id": format!("{province}007{i:06}"),
                "nombre": format!("CALLE {i}"),
                "provincia": {"id": province},
                "departamento": {"id": format!("{province}007")},
            })
        })
        .collect()
}

fn scoped(record: &Value, key: &str, id: &str) -> bool {
    record
        .get(key)
        .and_then(|region| region.get("id"))
        .and_then(Value::as_str)
        == Some(id)
}

#[async_trait]
impl GeorefApi for Deployment {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_page(&self, task: &FetchTask) -> ApiResult<CollectionPage> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let failing = match &task.filter {
            RegionFilter::National => false,
            RegionFilter::Province(code) => self.failing_provinces.contains(code),
            RegionFilter::Department(id) => self
                .failing_provinces
                .iter()
                .any(|code| id.starts_with(code.as_str())),
        };
        if failing {
            return Err(ApiError::ServerError {
                request: task.descriptor(),
                status: 500,
                message: "internal error".to_string(),
            });
        }
        if task.max + task.offset > 10_000 {
            return Err(ApiError::ClientError {
                request: task.descriptor(),
                status: 400,
                message: "max + inicio exceeds 10000".to_string(),
            });
        }

        let mut records: Vec<Value> = self
            .records
            .get(&task.entity)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|record| match &task.filter {
                RegionFilter::National => true,
                RegionFilter::Province(code) => scoped(record, "provincia", code),
                RegionFilter::Department(id) => scoped(record, "departamento", id),
            })
            .collect();
        records.sort_by(|a, b| a["id"].to_string().cmp(&b["id"].to_string()));

        let total = records.len();
        let records = records
            .into_iter()
            .skip(task.offset)
            .take(task.max)
            .map(|mut record| {
                if task.fields == FieldSet::Basic {
                    if let Some(map) = record.as_object_mut() {
                        map.retain(|key, _| key == "id" || key == "nombre");
                    }
                }
                record
            })
            .collect();

        Ok(CollectionPage { records, total })
    }

    async fn quota_headers(&self) -> ApiResult<HashMap<String, String>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.quota.clone())
    }

    async fn normalize_bulk(&self, queries: &[AddressQuery]) -> ApiResult<Vec<AddressMatches>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(queries.iter().map(|q| self.lookup(q)).collect())
    }

    async fn normalize_one(&self, query: &AddressQuery) -> ApiResult<AddressMatches> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.lookup(query))
    }

    async fn similar_bulk(
        &self,
        entity: EntityType,
        queries: &[NameQuery],
    ) -> ApiResult<Vec<Option<Value>>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let records = self.records.get(&entity).cloned().unwrap_or_default();
        Ok(queries
            .iter()
            .map(|query| {
                records
                    .iter()
                    .find(|record| record["nombre"].as_str() == Some(query.nombre.as_str()))
                    .cloned()
            })
            .collect())
    }

    async fn locate_bulk(&self, points: &[PointQuery]) -> ApiResult<Vec<Option<Value>>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(points
            .iter()
            .map(|point| {
                self.locations
                    .iter()
                    .find(|(known, _)| known.lat == point.lat && known.lon == point.lon)
                    .map(|(_, units)| units.clone())
            })
            .collect())
    }
}
