//! Batch address normalization
//!
//! Every input row ends in exactly one terminal [`RowOutcome`]:
//! `Normalized` with the best candidate, `NotFound` when the API has no
//! candidate, or `Errored` with the status and reason of the failed
//! request. Errors never stop the batch.
//!
//! # Example
//!
//! ```rust,no_run
//! use georef::adapters::georef::GeorefClient;
//! use georef::config::ApiConfig;
//! use georef::core::normalize::{AddressRow, BatchNormalizer, NormalizeSettings};
//! use georef::core::rate::RateGovernor;
//!
//! # async fn example() -> georef::domain::Result<()> {
//! let client = GeorefClient::new(&ApiConfig::default())?;
//! let governor = RateGovernor::unthrottled(4);
//! let normalizer = BatchNormalizer::new(&client, &governor, NormalizeSettings::default());
//!
//! let mut row = AddressRow::new("Belgrano 600");
//! row.localidad_censal = Some("Córdoba".to_string());
//!
//! let rows = normalizer.normalize_batch(vec![row]).await?;
//! println!("{:?}", rows[0].outcome.nomenclatura());
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod flatten;
pub mod lookup;
pub mod normalizer;
pub mod pipeline;

pub use address::{AddressReader, AddressRow};
pub use lookup::BatchLookup;
pub use normalizer::BatchNormalizer;
pub use pipeline::{
    count_rows, lookup_file, normalize_file, LookupTarget, NormalizeSummary, NormalizedWriter,
};

use crate::adapters::georef::QueryOptions;
use crate::config::{NormalizeConfig, RetryConfig};
use crate::domain::{ApiError, GeorefError};
use serde_json::Value;
use std::collections::BTreeMap;

/// Tuning of a normalization run
#[derive(Debug, Clone)]
pub struct NormalizeSettings {
    pub chunk_size: usize,
    pub batch_size: usize,
    pub max_concurrency: usize,
    /// Options sent with every address
    pub options: QueryOptions,
    pub retry: RetryConfig,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self::from_config(&NormalizeConfig::default(), RetryConfig::default())
    }
}

impl NormalizeSettings {
    pub fn from_config(config: &NormalizeConfig, retry: RetryConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            batch_size: config.batch_size,
            max_concurrency: config.max_concurrency,
            options: QueryOptions::default(),
            retry,
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

/// Terminal state of one address row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// First-ranked candidate
    Normalized(Value),
    /// The API returned no candidate
    NotFound,
    Errored { status: Option<u16>, reason: String },
}

impl RowOutcome {
    pub(crate) fn from_error(error: &ApiError) -> Self {
        RowOutcome::Errored {
            status: error.status(),
            reason: error.reason(),
        }
    }

    pub(crate) fn invalid(error: GeorefError) -> Self {
        RowOutcome::Errored {
            status: None,
            reason: error.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RowOutcome::Errored { .. })
    }

    /// Normalized address string, when there is one
    pub fn nomenclatura(&self) -> Option<&str> {
        match self {
            RowOutcome::Normalized(candidate) => candidate.get("nomenclatura")?.as_str(),
            _ => None,
        }
    }

    /// Output cells: flattened candidate fields, or the error columns
    pub fn cells(&self, prefix: Option<&str>) -> BTreeMap<String, String> {
        match self {
            RowOutcome::Normalized(candidate) => flatten::flatten_record(candidate, prefix)
                .into_iter()
                .map(|(column, value)| {
                    let text = match value {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (column, text)
                })
                .collect(),
            RowOutcome::NotFound => BTreeMap::new(),
            RowOutcome::Errored { status, reason } => BTreeMap::from([
                (
                    "error_status".to_string(),
                    status.map(|s| s.to_string()).unwrap_or_default(),
                ),
                ("error_reason".to_string(), reason.clone()),
            ]),
        }
    }
}

/// An input row with its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    /// Position in the input
    pub index: usize,
    pub address: AddressRow,
    pub outcome: RowOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cells_of_each_outcome() {
        let normalized = RowOutcome::Normalized(json!({
            "nomenclatura": "BELGRANO 600",
            "altura": {"valor": 600, "unidad": null}
        }));
        let cells = normalized.cells(None);
        assert_eq!(cells["nomenclatura"], "BELGRANO 600");
        assert_eq!(cells["altura_valor"], "600");
        assert_eq!(cells["altura_unidad"], "");

        assert!(RowOutcome::NotFound.cells(Some("n")).is_empty());

        let errored = RowOutcome::Errored {
            status: Some(500),
            reason: "internal error".to_string(),
        };
        let cells = errored.cells(Some("n"));
        assert_eq!(cells["error_status"], "500");
        assert_eq!(cells["error_reason"], "internal error");
    }

    #[test]
    fn test_from_error_keeps_status_and_reason() {
        let outcome = RowOutcome::from_error(&ApiError::Timeout {
            request: "direcciones".to_string(),
        });
        assert_eq!(
            outcome,
            RowOutcome::Errored {
                status: None,
                reason: "timeout".to_string()
            }
        );
        assert!(outcome.is_error());
    }
}
