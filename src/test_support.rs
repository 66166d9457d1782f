//! In-memory Georef deployment for unit tests

use crate::adapters::georef::{
    AddressMatches, AddressQuery, ApiResult, CollectionPage, FetchTask, FieldSet, GeorefApi,
    NameQuery, PointQuery,
};
use crate::domain::{ApiError, EntityType, RegionFilter};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

const PAGINATION_WINDOW: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum BulkMode {
    #[default]
    Ok,
    /// Every bulk request answers 503
    Fail,
    /// Bulk responses carry one result less than requested
    Short,
}

#[derive(Debug, Default)]
pub(crate) struct FakeApi {
    records: HashMap<EntityType, Vec<Value>>,
    departments: BTreeSet<(String, String)>,
    failing_provinces: HashSet<String>,
    failing_national: bool,
    unreachable: bool,
    timing_out: bool,
    quota: HashMap<String, String>,
    addresses: HashMap<String, Value>,
    failing_addresses: HashSet<String>,
    locations: Vec<(PointQuery, Value)>,
    bulk_mode: BulkMode,
    requests: AtomicUsize,
    bulk_requests: AtomicUsize,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds `n` records of `entity` located in `department` of `province`
    pub(crate) fn with_records(
        mut self,
        entity: EntityType,
        province: &str,
        department: &str,
        n: usize,
    ) -> Self {
        self.departments
            .insert((province.to_string(), department.to_string()));
        let records = self.records.entry(entity).or_default();
        for _ in 0..n {
            let id = format!("{department}-{:05}", records.len());
            records.push(json!({
                "id": id,
                "nombre": format!("{entity} {id}"),
                "provincia": {"id": province, "nombre": format!("Provincia {province}")},
                "departamento": {"id": department, "nombre": format!("Departamento {department}")},
            }));
        }
        self
    }

    pub(crate) fn with_record(mut self, entity: EntityType, record: Value) -> Self {
        self.records.entry(entity).or_default().push(record);
        self
    }

    /// Every request scoped to `code` or one of its departments answers 500
    pub(crate) fn failing_province(mut self, code: &str) -> Self {
        self.failing_provinces.insert(code.to_string());
        self
    }

    /// Unscoped requests answer 500
    pub(crate) fn failing_national(mut self) -> Self {
        self.failing_national = true;
        self
    }

    pub(crate) fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Every request times out
    pub(crate) fn timing_out(mut self) -> Self {
        self.timing_out = true;
        self
    }

    pub(crate) fn with_quota(mut self, headers: &[(&str, &str)]) -> Self {
        self.quota = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    /// `direccion` resolves to `best`
    pub(crate) fn with_address(mut self, direccion: &str, best: Value) -> Self {
        self.addresses.insert(direccion.to_string(), best);
        self
    }

    /// Single requests for `direccion` answer 500 and bulk requests
    /// containing it, as an address or a name, answer 503
    pub(crate) fn failing_address(mut self, direccion: &str) -> Self {
        self.failing_addresses.insert(direccion.to_string());
        self
    }

    /// `(lat, lon)` lies within the flat territorial units `units`
    pub(crate) fn with_location(mut self, lat: f64, lon: f64, units: Value) -> Self {
        self.locations.push((PointQuery::new(lat, lon), units));
        self
    }

    pub(crate) fn bulk_mode(mut self, mode: BulkMode) -> Self {
        self.bulk_mode = mode;
        self
    }

    /// Requests served so far, bulk requests included
    pub(crate) fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub(crate) fn bulk_requests(&self) -> usize {
        self.bulk_requests.load(Ordering::SeqCst)
    }

    fn connection_check(&self, request: &str) -> ApiResult<()> {
        if self.unreachable {
            return Err(ApiError::ConnectionFailed {
                request: request.to_string(),
                message: "connection refused".to_string(),
            });
        }
        if self.timing_out {
            return Err(ApiError::Timeout {
                request: request.to_string(),
            });
        }
        Ok(())
    }

    fn scope_fails(&self, filter: &RegionFilter) -> bool {
        match filter {
            RegionFilter::National => self.failing_national,
            RegionFilter::Province(code) => self.failing_provinces.contains(code),
            RegionFilter::Department(id) => self
                .failing_provinces
                .iter()
                .any(|code| id.starts_with(code.as_str())),
        }
    }

    fn collection(&self, entity: EntityType) -> Vec<Value> {
        match self.records.get(&entity) {
            Some(records) => records.clone(),
            None if entity == EntityType::Departments => self
                .departments
                .iter()
                .map(|(province, department)| {
                    json!({
                        "id": department,
                        "nombre": format!("Departamento {department}"),
                        "provincia": {"id": province},
                    })
                })
                .collect(),
            None => Vec::new(),
        }
    }

    fn matches(record: &Value, filter: &RegionFilter) -> bool {
        let scoped = |key: &str, code: &str| {
            record
                .get(key)
                .and_then(|region| region.get("id"))
                .and_then(Value::as_str)
                == Some(code)
        };
        match filter {
            RegionFilter::National => true,
            RegionFilter::Province(code) => scoped("provincia", code),
            RegionFilter::Department(id) => scoped("departamento", id),
        }
    }

    fn bulk_check(&self, request: String, poisoned: bool) -> ApiResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.bulk_requests.fetch_add(1, Ordering::SeqCst);
        self.connection_check(&request)?;

        if self.bulk_mode == BulkMode::Fail || poisoned {
            return Err(ApiError::ServerError {
                request,
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn shorten<T>(&self, mut results: Vec<T>) -> Vec<T> {
        if self.bulk_mode == BulkMode::Short {
            results.pop();
        }
        results
    }

    fn lookup(&self, query: &AddressQuery) -> AddressMatches {
        AddressMatches {
            direcciones: self
                .addresses
                .get(&query.direccion)
                .cloned()
                .into_iter()
                .collect(),
        }
    }
}

#[async_trait]
impl GeorefApi for FakeApi {
    fn base_url(&self) -> &str {
        "http://fake.georef/"
    }

    async fn fetch_page(&self, task: &FetchTask) -> ApiResult<CollectionPage> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let request = task.descriptor();
        self.connection_check(&request)?;

        if self.scope_fails(&task.filter) {
            return Err(ApiError::ServerError {
                request,
                status: 500,
                message: "internal error".to_string(),
            });
        }
        if task.max + task.offset > PAGINATION_WINDOW {
            return Err(ApiError::ClientError {
                request,
                status: 400,
                message: "max + inicio exceeds 10000".to_string(),
            });
        }

        let mut records: Vec<Value> = self
            .collection(task.entity)
            .into_iter()
            .filter(|record| Self::matches(record, &task.filter))
            .collect();
        if task.order.is_some() {
            records.sort_by(|a, b| {
                let id = |v: &Value| v.get("id").map(|id| id.to_string()).unwrap_or_default();
                id(a).cmp(&id(b))
            });
        }

        let total = records.len();
        let mut page: Vec<Value> = records
            .into_iter()
            .skip(task.offset)
            .take(task.max)
            .collect();
        if task.fields == FieldSet::Basic {
            for record in &mut page {
                if let Some(map) = record.as_object_mut() {
                    map.retain(|key, _| key == "id" || key == "nombre");
                }
            }
        }

        Ok(CollectionPage {
            records: page,
            total,
        })
    }

    async fn quota_headers(&self) -> ApiResult<HashMap<String, String>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.connection_check("provincias?campos=basico&max=1")?;
        Ok(self.quota.clone())
    }

    async fn normalize_bulk(&self, queries: &[AddressQuery]) -> ApiResult<Vec<AddressMatches>> {
        let poisoned = queries
            .iter()
            .any(|q| self.failing_addresses.contains(&q.direccion));
        self.bulk_check(format!("POST direcciones[{}]", queries.len()), poisoned)?;

        Ok(self.shorten(queries.iter().map(|q| self.lookup(q)).collect()))
    }

    async fn normalize_one(&self, query: &AddressQuery) -> ApiResult<AddressMatches> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let request = format!("direcciones?direccion={}", query.direccion);
        self.connection_check(&request)?;

        if self.failing_addresses.contains(&query.direccion) {
            return Err(ApiError::ServerError {
                request,
                status: 500,
                message: "internal error".to_string(),
            });
        }
        Ok(self.lookup(query))
    }

    async fn similar_bulk(
        &self,
        entity: EntityType,
        queries: &[NameQuery],
    ) -> ApiResult<Vec<Option<Value>>> {
        let poisoned = queries
            .iter()
            .any(|q| self.failing_addresses.contains(&q.nombre));
        self.bulk_check(
            format!("POST {}[{}]", entity.endpoint(), queries.len()),
            poisoned,
        )?;

        let records = self.collection(entity);
        let results = queries
            .iter()
            .map(|query| {
                records
                    .iter()
                    .find(|record| record["nombre"].as_str() == Some(query.nombre.as_str()))
                    .cloned()
            })
            .collect();
        Ok(self.shorten(results))
    }

    async fn locate_bulk(&self, points: &[PointQuery]) -> ApiResult<Vec<Option<Value>>> {
        self.bulk_check(format!("POST ubicacion[{}]", points.len()), false)?;

        let results = points
            .iter()
            .map(|point| {
                self.locations
                    .iter()
                    .find(|(known, _)| known.lat == point.lat && known.lon == point.lon)
                    .map(|(_, units)| units.clone())
            })
            .collect();
        Ok(self.shorten(results))
    }
}
