//! Record flattening for tabular output
//!
//! Converts a nested normalization candidate into flat column names:
//! - `{"calle": {"nombre": "X"}}` → `calle_nombre`
//! - `{"ubicacion": {"lat": -34.6}}` → `ubicacion_lat`
//!
//! Arrays and scalars are leaves.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

const SEPARATOR: &str = "_";

/// Flatten a record into `column → leaf value`
///
/// A non-empty `prefix` is prepended to every top-level key. An empty object
/// yields no columns.
///
/// # Examples
///
/// ```
/// use georef::core::normalize::flatten::flatten_record;
/// use serde_json::json;
///
/// let record = json!({"nomenclatura": "BELGRANO 600", "calle": {"id": "1"}});
/// let fields = flatten_record(&record, Some("norm"));
///
/// assert_eq!(fields["norm_nomenclatura"], "BELGRANO 600");
/// assert_eq!(fields["norm_calle_id"], "1");
/// ```
pub fn flatten_record(record: &Value, prefix: Option<&str>) -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();
    match record {
        Value::Object(map) => flatten_into(map, prefix.unwrap_or_default(), &mut fields),
        other => {
            fields.insert(prefix.unwrap_or("value").to_string(), other.clone());
        }
    }
    fields
}

fn flatten_into(map: &Map<String, Value>, path: &str, fields: &mut BTreeMap<String, Value>) {
    for (key, value) in map {
        let column = flatten_key(path, key);
        match value {
            Value::Object(inner) => flatten_into(inner, &column, fields),
            leaf => {
                fields.insert(column, leaf.clone());
            }
        }
    }
}

fn flatten_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}{SEPARATOR}{key}")
    }
}
