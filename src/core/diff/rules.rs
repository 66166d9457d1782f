//! Per-layer comparison rules

use super::engine::DiffOptions;
use crate::domain::{EntityType, GeorefError, Result};
use regex::Regex;

/// Tolerance and exclusions applied when diffing one layer
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRules {
    pub significant_digits: u32,
    pub exclude_patterns: Vec<String>,
}

impl DiffRules {
    /// Default rules of a layer
    ///
    /// Street door numbers need two decimals; `departamentos` carry a
    /// volatile `fuente` and census localities a churning `centroide`.
    pub fn for_entity(entity: EntityType) -> Self {
        let significant_digits = match entity {
            EntityType::Streets => 2,
            _ => 1,
        };
        let exclude_patterns = match entity {
            EntityType::Departments => vec![r"^fuente$".to_string()],
            EntityType::CensusLocalities => vec![r"^centroide(\.|$)".to_string()],
            _ => Vec::new(),
        };
        Self {
            significant_digits,
            exclude_patterns,
        }
    }

    /// Adds configured patterns to the defaults
    pub fn with_patterns(mut self, patterns: &[String]) -> Self {
        for pattern in patterns {
            if !self.exclude_patterns.contains(pattern) {
                self.exclude_patterns.push(pattern.clone());
            }
        }
        self
    }

    /// Compiles the rules into engine options
    ///
    /// # Errors
    ///
    /// Returns `GeorefError::Configuration` for an invalid pattern.
    pub fn compile(&self) -> Result<DiffOptions> {
        let exclude_paths = self
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    GeorefError::Configuration(format!("Invalid exclude pattern '{pattern}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DiffOptions {
            significant_digits: self.significant_digits,
            ignore_order: true,
            exclude_paths,
        })
    }
}
