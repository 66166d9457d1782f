//! Diff report writers
//!
//! A layer diff is written as `diff_<layer>.json` (the nested report) and/or
//! `diff_<layer>.csv` (one row per id).

use super::engine::DiffResult;
use super::pipeline::LayerDiff;
use crate::config::OutputExtension;
use crate::core::fetch::PartitionFailure;
use crate::domain::{EntityId, EntityType, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Nested JSON report of one layer
#[derive(Debug, Serialize)]
pub struct DiffReport<'a> {
    pub entity: EntityType,
    pub generated_at: DateTime<Utc>,
    pub source_url: &'a str,
    pub target_url: &'a str,
    pub source_registers: usize,
    pub target_registers: usize,
    pub diff: &'a DiffResult,
    /// Partitions missing from either side; the diff excludes their records
    pub failures: Vec<&'a PartitionFailure>,
    /// Added/removed ids left out because they lie in a failed partition
    pub withheld: usize,
}

impl<'a> DiffReport<'a> {
    pub fn new(layer: &'a LayerDiff) -> Self {
        Self {
            entity: layer.entity,
            generated_at: Utc::now(),
            source_url: &layer.source_url,
            target_url: &layer.target_url,
            source_registers: layer.source.collection.len(),
            target_registers: layer.target.collection.len(),
            diff: &layer.result,
            failures: layer
                .source
                .failures
                .iter()
                .chain(&layer.target.failures)
                .collect(),
            withheld: layer.withheld,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// One row of the tabular view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffRow {
    pub added: bool,
    pub removed: bool,
    /// `<path>(old)` / `<path>(new)` to cell text
    pub cells: BTreeMap<String, String>,
}

/// Flat per-id view of a diff result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffTable {
    pub rows: BTreeMap<EntityId, DiffRow>,
    paths: BTreeSet<String>,
}

impl DiffTable {
    pub fn from_result(result: &DiffResult) -> Self {
        let mut table = Self::default();

        for id in &result.added {
            table.rows.entry(id.clone()).or_default().added = true;
        }
        for id in &result.removed {
            table.rows.entry(id.clone()).or_default().removed = true;
        }
        for changes in [&result.values_changed, &result.type_changes] {
            for (id, paths) in changes {
                for (path, change) in paths {
                    table.set(id, path, Some(&change.old_value), Some(&change.new_value));
                }
            }
        }
        for (id, paths) in &result.fields_added {
            for (path, value) in paths {
                table.set(id, path, None, Some(value));
            }
        }
        for (id, paths) in &result.fields_removed {
            for (path, value) in paths {
                table.set(id, path, Some(value), None);
            }
        }

        table
    }

    fn set(&mut self, id: &EntityId, path: &str, old: Option<&Value>, new: Option<&Value>) {
        let row = self.rows.entry(id.clone()).or_default();
        if let Some(old) = old {
            row.cells.insert(format!("{path}(old)"), cell(old));
        }
        if let Some(new) = new {
            row.cells.insert(format!("{path}(new)"), cell(new));
        }
        self.paths.insert(path.to_string());
    }

    /// Header without the leading `id`, `added`, `removed`
    pub fn columns(&self) -> Vec<String> {
        self.paths
            .iter()
            .flat_map(|path| [format!("{path}(old)"), format!("{path}(new)")])
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let columns = self.columns();
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = vec!["id".to_string(), "added".to_string(), "removed".to_string()];
        header.extend(columns.iter().cloned());
        csv.write_record(&header)?;

        for (id, row) in &self.rows {
            let mut record = vec![
                id.to_string(),
                row.added.to_string(),
                row.removed.to_string(),
            ];
            record.extend(
                columns
                    .iter()
                    .map(|column| row.cells.get(column).cloned().unwrap_or_default()),
            );
            csv.write_record(&record)?;
        }

        csv.flush()?;
        Ok(())
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Writes the report files of one layer into `dir`
///
/// Returns the paths written.
pub fn write_layer(
    layer: &LayerDiff,
    dir: &Path,
    extension: OutputExtension,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    if extension.writes_json() {
        let path = dir.join(format!("diff_{}.json", layer.entity));
        DiffReport::new(layer).write_json(&path)?;
        written.push(path);
    }

    if extension.writes_csv() {
        let path = dir.join(format!("diff_{}.csv", layer.entity));
        DiffTable::from_result(&layer.result).write_csv(BufWriter::new(File::create(&path)?))?;
        written.push(path);
    }

    for path in &written {
        tracing::debug!(path = %path.display(), "Report written");
    }

    Ok(written)
}
