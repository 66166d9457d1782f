//! Top-level administrative regions and region filters

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A top-level region (23 provinces plus the capital district)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Province {
    /// Two-digit INDEC code
    pub code: &'static str,
    /// Display name
    pub name: &'static str,
}

/// Static table of the 24 top-level regions, ordered by code
pub const PROVINCES: [Province; 24] = [
    Province { code: "02", name: "Ciudad Autónoma de Buenos Aires" },
    Province { code: "06", name: "Buenos Aires" },
    Province { code: "10", name: "Catamarca" },
    Province { code: "14", name: "Córdoba" },
    Province { code: "18", name: "Corrientes" },
    Province { code: "22", name: "Chaco" },
    Province { code: "26", name: "Chubut" },
    Province { code: "30", name: "Entre Ríos" },
    Province { code: "34", name: "Formosa" },
    Province { code: "38", name: "Jujuy" },
    Province { code: "42", name: "La Pampa" },
    Province { code: "46", name: "La Rioja" },
    Province { code: "50", name: "Mendoza" },
    Province { code: "54", name: "Misiones" },
    Province { code: "58", name: "Neuquén" },
    Province { code: "62", name: "Río Negro" },
    Province { code: "66", name: "Salta" },
    Province { code: "70", name: "San Juan" },
    Province { code: "74", name: "San Luis" },
    Province { code: "78", name: "Santa Cruz" },
    Province { code: "82", name: "Santa Fe" },
    Province { code: "86", name: "Santiago del Estero" },
    Province { code: "90", name: "Tucumán" },
    Province { code: "94", name: "Tierra del Fuego, Antártida e Islas del Atlántico Sur" },
];

/// Looks up a province by its code
pub fn province(code: &str) -> Option<&'static Province> {
    PROVINCES.iter().find(|p| p.code == code)
}

/// Nested reference to the owning region, as embedded in entity records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRef {
    pub id: String,
    pub nombre: Option<String>,
}

/// Region scope of a query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum RegionFilter {
    /// Whole country
    #[default]
    National,
    /// `provincia=<code>`
    Province(String),
    /// `departamento=<id>`
    Department(String),
}

impl RegionFilter {
    /// Query parameter pair for this filter, if any
    pub fn query_pair(&self) -> Option<(&'static str, &str)> {
        match self {
            RegionFilter::National => None,
            RegionFilter::Province(code) => Some(("provincia", code.as_str())),
            RegionFilter::Department(id) => Some(("departamento", id.as_str())),
        }
    }

    /// Whether `record` lies inside this region
    ///
    /// The region is read from the record's nested `provincia.id` or
    /// `departamento.id`; integer ids compare by their decimal text.
    pub fn covers(&self, record: &Value) -> bool {
        let region_id = |key: &str| match record.get(key).and_then(|region| region.get("id")) {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };
        match self {
            RegionFilter::National => true,
            RegionFilter::Province(code) => region_id("provincia").as_deref() == Some(code.as_str()),
            RegionFilter::Department(id) => region_id("departamento").as_deref() == Some(id.as_str()),
        }
    }
}

impl fmt::Display for RegionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionFilter::National => f.write_str("national"),
            RegionFilter::Province(code) => write!(f, "provincia[{code}]"),
            RegionFilter::Department(id) => write!(f, "departamento[{id}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_province_table_is_complete_and_unique() {
        let codes: HashSet<&str> = PROVINCES.iter().map(|p| p.code).collect();
        assert_eq!(codes.len(), 24);
        assert_eq!(PROVINCES[0].code, "02");
        assert_eq!(PROVINCES[23].code, "94");
    }

    #[test]
    fn test_province_lookup() {
        assert_eq!(province("14").map(|p| p.name), Some("Córdoba"));
        assert!(province("99").is_none());
    }

    #[test]
    fn test_region_filter_query_pair() {
        assert_eq!(RegionFilter::National.query_pair(), None);
        assert_eq!(
            RegionFilter::Province("06".into()).query_pair(),
            Some(("provincia", "06"))
        );
        assert_eq!(
            RegionFilter::Department("06007".into()).query_pair(),
            Some(("departamento", "06007"))
        );
    }

    #[test]
    fn test_region_filter_covers_records() {
        let record = serde_json::json!({
            "id": "06007000001",
            "provincia": {"id": "06"},
            "departamento": {"id": 6007}
        });
        assert!(RegionFilter::National.covers(&record));
        assert!(RegionFilter::Province("06".into()).covers(&record));
        assert!(!RegionFilter::Province("02".into()).covers(&record));
        assert!(RegionFilter::Department("6007".into()).covers(&record));
        assert!(!RegionFilter::Province("06".into()).covers(&serde_json::json!({"id": "06"})));
    }

    #[test]
    fn test_region_filter_display() {
        assert_eq!(RegionFilter::Province("06".into()).to_string(), "provincia[06]");
    }
}
