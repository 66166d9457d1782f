//! Georef API request and response models

use crate::domain::{ApiError, EntityType, RegionFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result type of single API requests
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Response shape requested through `campos`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSet {
    /// Minimal records, used for counting and id listings
    Basic,
    /// Complete records
    Full,
}

impl FieldSet {
    pub fn as_param(&self) -> &'static str {
        match self {
            FieldSet::Basic => "basico",
            FieldSet::Full => "completo",
        }
    }
}

/// One paginated collection request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub entity: EntityType,
    pub fields: FieldSet,
    /// Sort field; `id` for every full-payload request so paging is stable
    pub order: Option<&'static str>,
    pub max: usize,
    pub offset: usize,
    pub filter: RegionFilter,
}

impl FetchTask {
    /// The counting phase: basic fields, one row, read `total`
    pub fn count(entity: EntityType, filter: RegionFilter) -> Self {
        Self {
            entity,
            fields: FieldSet::Basic,
            order: None,
            max: 1,
            offset: 0,
            filter,
        }
    }

    /// A full-payload page ordered by id
    pub fn full(entity: EntityType, filter: RegionFilter, max: usize) -> Self {
        Self {
            entity,
            fields: FieldSet::Full,
            order: Some("id"),
            max,
            offset: 0,
            filter,
        }
    }

    /// The department id listing of one province
    pub fn department_ids(province_code: &str, max: usize) -> Self {
        Self {
            entity: EntityType::Departments,
            fields: FieldSet::Basic,
            order: Some("id"),
            max,
            offset: 0,
            filter: RegionFilter::Province(province_code.to_string()),
        }
    }

    /// Same request starting at `offset`
    pub fn at_offset(&self, offset: usize) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    /// Query string parameters, in a stable order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("campos", self.fields.as_param().to_string())];
        if let Some(order) = self.order {
            pairs.push(("orden", order.to_string()));
        }
        pairs.push(("max", self.max.to_string()));
        if self.offset > 0 {
            pairs.push(("inicio", self.offset.to_string()));
        }
        if let Some((key, value)) = self.filter.query_pair() {
            pairs.push((key, value.to_string()));
        }
        pairs
    }

    /// `endpoint?query` string identifying the request in errors and logs
    pub fn descriptor(&self) -> String {
        let query: Vec<String> = self
            .query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{}?{}", self.entity.endpoint(), query.join("&"))
    }
}

/// One page of an entity collection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionPage {
    pub records: Vec<Value>,
    /// Size of the whole result set the page belongs to
    pub total: usize,
}

impl CollectionPage {
    /// Extracts the records array and `total` from a response body
    pub fn from_body(entity: EntityType, body: Value, request: &str) -> ApiResult<Self> {
        let mut body = match body {
            Value::Object(map) => map,
            other => {
                return Err(ApiError::InvalidResponse {
                    request: request.to_string(),
                    message: format!("expected a JSON object, got {}", json_type(&other)),
                })
            }
        };

        let records = match body.remove(entity.collection_key()) {
            Some(Value::Array(records)) => records,
            _ => {
                return Err(ApiError::InvalidResponse {
                    request: request.to_string(),
                    message: format!("missing '{}' array", entity.collection_key()),
                })
            }
        };

        let total = body
            .get("total")
            .and_then(Value::as_u64)
            .map(|t| t as usize)
            .unwrap_or(records.len());

        Ok(Self { records, total })
    }
}

/// Shared query options of address normalization requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campos: Option<String>,
    pub max: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exacto: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aplanar: Option<bool>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            campos: None,
            max: 1,
            exacto: None,
            aplanar: None,
        }
    }
}

/// A single address normalization query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressQuery {
    pub direccion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provincia: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departamento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub localidad_censal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub localidad: Option<String>,
    #[serde(flatten)]
    pub options: QueryOptions,
}

impl AddressQuery {
    pub fn new(direccion: impl Into<String>) -> Self {
        Self {
            direccion: direccion.into(),
            provincia: None,
            departamento: None,
            localidad_censal: None,
            localidad: None,
            options: QueryOptions::default(),
        }
    }

    /// Query string parameters for `GET direcciones`
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("direccion", self.direccion.clone())];
        let filters = [
            ("provincia", &self.provincia),
            ("departamento", &self.departamento),
            ("localidad_censal", &self.localidad_censal),
            ("localidad", &self.localidad),
        ];
        for (key, value) in filters {
            if let Some(value) = value {
                pairs.push((key, value.clone()));
            }
        }
        if let Some(campos) = &self.options.campos {
            pairs.push(("campos", campos.clone()));
        }
        pairs.push(("max", self.options.max.to_string()));
        if let Some(exacto) = self.options.exacto {
            pairs.push(("exacto", exacto.to_string()));
        }
        if let Some(aplanar) = self.options.aplanar {
            pairs.push(("aplanar", aplanar.to_string()));
        }
        pairs
    }
}

/// Body of `POST direcciones`
#[derive(Debug, Serialize)]
pub struct BulkAddressRequest<'a> {
    pub direcciones: &'a [AddressQuery],
}

/// Response of `POST direcciones`
#[derive(Debug, Clone, Deserialize)]
pub struct BulkAddressResponse {
    pub resultados: Vec<AddressMatches>,
}

/// Candidate matches of one address, best first
///
/// Also the shape of a `GET direcciones` response body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AddressMatches {
    #[serde(default)]
    pub direcciones: Vec<Value>,
}

impl AddressMatches {
    /// First-ranked candidate, if any
    pub fn best(&self) -> Option<&Value> {
        self.direcciones.first()
    }
}

/// A name matched against the records of one entity layer
///
/// Bulk `POST <layer>` bodies carry a list of these under the layer's
/// collection key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameQuery {
    pub nombre: String,
    pub max: usize,
}

impl NameQuery {
    pub fn new(nombre: impl Into<String>) -> Self {
        Self {
            nombre: nombre.into(),
            max: 1,
        }
    }
}

/// A point whose containing territorial units are requested
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointQuery {
    pub lat: f64,
    pub lon: f64,
    /// Ask for a flat `provincia_id`, `departamento_nombre`, ... result
    pub aplanar: bool,
}

impl PointQuery {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            aplanar: true,
        }
    }

    /// Finite coordinates within the valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Best answer of each query of a bulk response, in query order
///
/// Each entry of `resultados` holds `key`: an array whose first element is
/// the best match, or a single object. Empty arrays, empty objects and
/// `null` mean no match.
pub fn best_results(body: Value, key: &str, request: &str) -> ApiResult<Vec<Option<Value>>> {
    let invalid = |message: String| ApiError::InvalidResponse {
        request: request.to_string(),
        message,
    };

    let results = match body {
        Value::Object(mut map) => match map.remove("resultados") {
            Some(Value::Array(results)) => results,
            _ => return Err(invalid("missing 'resultados' array".to_string())),
        },
        other => {
            return Err(invalid(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            )))
        }
    };

    Ok(results
        .into_iter()
        .map(|mut result| match result.get_mut(key).map(Value::take) {
            Some(Value::Array(matches)) => matches.into_iter().next(),
            Some(Value::Object(found)) if !found.is_empty() => Some(Value::Object(found)),
            _ => None,
        })
        .collect())
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_task_descriptor() {
        let task = FetchTask::count(EntityType::Streets, RegionFilter::Province("06".into()));
        assert_eq!(task.descriptor(), "calles?campos=basico&max=1&provincia=06");
    }

    #[test]
    fn test_full_task_descriptor_with_offset() {
        let task = FetchTask::full(
            EntityType::CensusLocalities,
            RegionFilter::Department("06007".into()),
            5000,
        )
        .at_offset(5000);
        assert_eq!(
            task.descriptor(),
            "localidades-censales?campos=completo&orden=id&max=5000&inicio=5000&departamento=06007"
        );
    }

    #[test]
    fn test_department_ids_task() {
        let task = FetchTask::department_ids("02", 5000);
        assert_eq!(
            task.descriptor(),
            "departamentos?campos=basico&orden=id&max=5000&provincia=02"
        );
    }

    #[test]
    fn test_collection_page_uses_collection_key() {
        let body = json!({
            "localidades_censales": [{"id": "1"}, {"id": "2"}],
            "total": 7,
            "cantidad": 2,
            "inicio": 0
        });
        let page = CollectionPage::from_body(EntityType::CensusLocalities, body, "req").unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.total, 7);
    }

    #[test]
    fn test_collection_page_missing_array_is_invalid() {
        let err = CollectionPage::from_body(EntityType::Provinces, json!({"total": 1}), "req")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse { .. }));
    }

    #[test]
    fn test_collection_page_missing_total_defaults_to_len() {
        let page =
            CollectionPage::from_body(EntityType::Provinces, json!({"provincias": [{}]}), "req")
                .unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn test_address_query_serialization_skips_empty_filters() {
        let mut query = AddressQuery::new("Belgrano 600");
        query.localidad_censal = Some("Córdoba".to_string());
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(
            json,
            json!({"direccion": "Belgrano 600", "localidad_censal": "Córdoba", "max": 1})
        );
    }

    #[test]
    fn test_address_query_pairs() {
        let mut query = AddressQuery::new("Corrientes 1000");
        query.provincia = Some("02".to_string());
        query.options.exacto = Some(true);
        let keys: Vec<&str> = query.query_pairs().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["direccion", "provincia", "max", "exacto"]);
    }

    #[test]
    fn test_name_query_body() {
        let json = serde_json::to_value(NameQuery::new("Cordoba")).unwrap();
        assert_eq!(json, json!({"nombre": "Cordoba", "max": 1}));
    }

    #[test]
    fn test_point_query_validity() {
        assert!(PointQuery::new(-34.6, -58.4).is_valid());
        assert!(!PointQuery::new(f64::NAN, -58.4).is_valid());
        assert!(!PointQuery::new(-34.6, 200.0).is_valid());
        assert_eq!(
            serde_json::to_value(PointQuery::new(-34.6, -58.4)).unwrap(),
            json!({"lat": -34.6, "lon": -58.4, "aplanar": true})
        );
    }

    #[test]
    fn test_best_results_of_arrays_and_objects() {
        let names = json!({"resultados": [
            {"provincias": [{"id": "14", "nombre": "Córdoba"}, {"id": "22"}]},
            {"provincias": []}
        ]});
        let best = best_results(names, "provincias", "req").unwrap();
        assert_eq!(best[0], Some(json!({"id": "14", "nombre": "Córdoba"})));
        assert_eq!(best[1], None);

        let points = json!({"resultados": [
            {"ubicacion": {"provincia_id": "02", "lat": -34.6}},
            {"ubicacion": {}},
            {"ubicacion": null}
        ]});
        let best = best_results(points, "ubicacion", "req").unwrap();
        assert_eq!(best.len(), 3);
        assert!(best[0].is_some());
        assert!(best[1].is_none() && best[2].is_none());
    }

    #[test]
    fn test_best_results_requires_resultados() {
        let err = best_results(json!({"ubicacion": {}}), "ubicacion", "req").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse { .. }));
    }

    #[test]
    fn test_bulk_response_missing_direcciones_defaults_empty() {
        let response: BulkAddressResponse =
            serde_json::from_value(json!({"resultados": [{}, {"direcciones": [{"id": 1}]}]}))
                .unwrap();
        assert!(response.resultados[0].best().is_none());
        assert!(response.resultados[1].best().is_some());
    }
}
