//! Deployment diffing
//!
//! - [`engine`] - Structural, order-insensitive, numeric-tolerant diff
//! - [`rules`] - Per-layer tolerance and field exclusions
//! - [`pipeline`] - Fetch both deployments and diff a layer
//! - [`export`] - CSV table and nested JSON report writers

pub mod engine;
pub mod export;
pub mod pipeline;
pub mod rules;

pub use engine::{diff, Change, DiffOptions, DiffResult};
pub use export::{write_layer, DiffReport, DiffRow, DiffTable};
pub use pipeline::{DiffPipeline, LayerDiff};
pub use rules::DiffRules;
