//! Structural diff of two keyed collections
//!
//! Records sharing an id are walked recursively. Paths are dotted
//! (`centroide.lat`, `provincia.nombre`) with array positions in brackets
//! (`municipios[2]`); the entity id is never part of the path.

use crate::adapters::georef::models::json_type;
use crate::domain::{EntityId, KeyedCollection};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Comparison options
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Decimal places two numbers must agree on
    pub significant_digits: u32,
    /// Compare arrays as multisets
    pub ignore_order: bool,
    /// Matched against the dotted path; a match skips the whole subtree
    pub exclude_paths: Vec<Regex>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            significant_digits: 1,
            ignore_order: true,
            exclude_paths: Vec::new(),
        }
    }
}

impl DiffOptions {
    fn excluded(&self, path: &str) -> bool {
        !path.is_empty() && self.exclude_paths.iter().any(|re| re.is_match(path))
    }
}

/// Old and new value of one path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub old_value: Value,
    pub new_value: Value,
}

type PathMap<T> = BTreeMap<String, T>;

/// Differences between a source and a target collection
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffResult {
    /// Ids only in the target
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub added: Vec<EntityId>,
    /// Ids only in the source
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<EntityId>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub values_changed: BTreeMap<EntityId, PathMap<Change>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub type_changes: BTreeMap<EntityId, PathMap<Change>>,
    /// Paths of shared ids present only in the target
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields_added: BTreeMap<EntityId, PathMap<Value>>,
    /// Paths of shared ids present only in the source
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields_removed: BTreeMap<EntityId, PathMap<Value>>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.values_changed.is_empty()
            && self.type_changes.is_empty()
            && self.fields_added.is_empty()
            && self.fields_removed.is_empty()
    }

    /// Shared ids with at least one field difference
    pub fn changed_ids(&self) -> BTreeSet<&EntityId> {
        self.values_changed
            .keys()
            .chain(self.type_changes.keys())
            .chain(self.fields_added.keys())
            .chain(self.fields_removed.keys())
            .collect()
    }
}

/// Per-record accumulator, moved into the result only when non-empty
#[derive(Default)]
struct RecordDiff {
    values_changed: PathMap<Change>,
    type_changes: PathMap<Change>,
    fields_added: PathMap<Value>,
    fields_removed: PathMap<Value>,
}

/// Computes the difference from `source` to `target`
///
/// # Example
///
/// ```
/// use georef::core::diff::{diff, DiffOptions};
/// use georef::domain::KeyedCollection;
/// use serde_json::json;
///
/// let (source, _) = KeyedCollection::from_records(vec![
///     json!({"id": "02", "centroide": {"lat": -34.6144}}),
/// ]);
/// let (target, _) = KeyedCollection::from_records(vec![
///     json!({"id": "02", "centroide": {"lat": -34.6181}}),
/// ]);
///
/// assert!(diff(&source, &target, &DiffOptions::default()).is_empty());
/// ```
pub fn diff(source: &KeyedCollection, target: &KeyedCollection, options: &DiffOptions) -> DiffResult {
    let mut result = DiffResult::default();

    for (id, old) in source.iter() {
        let Some(new) = target.get(id) else {
            result.removed.push(id.clone());
            continue;
        };

        let mut record = RecordDiff::default();
        compare("", old, new, options, &mut record);

        if !record.values_changed.is_empty() {
            result.values_changed.insert(id.clone(), record.values_changed);
        }
        if !record.type_changes.is_empty() {
            result.type_changes.insert(id.clone(), record.type_changes);
        }
        if !record.fields_added.is_empty() {
            result.fields_added.insert(id.clone(), record.fields_added);
        }
        if !record.fields_removed.is_empty() {
            result.fields_removed.insert(id.clone(), record.fields_removed);
        }
    }

    result.added = target
        .ids()
        .filter(|id| !source.contains(id))
        .cloned()
        .collect();

    result
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn compare(path: &str, old: &Value, new: &Value, options: &DiffOptions, out: &mut RecordDiff) {
    if options.excluded(path) {
        return;
    }

    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_value) in old_map {
                let child = join(path, key);
                match new_map.get(key) {
                    Some(new_value) => compare(&child, old_value, new_value, options, out),
                    None if !options.excluded(&child) => {
                        out.fields_removed.insert(child, old_value.clone());
                    }
                    None => {}
                }
            }
            for (key, new_value) in new_map {
                if !old_map.contains_key(key) {
                    let child = join(path, key);
                    if !options.excluded(&child) {
                        out.fields_added.insert(child, new_value.clone());
                    }
                }
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            if options.ignore_order {
                compare_unordered(path, old_items, new_items, options, out);
            } else {
                compare_ordered(path, old_items, new_items, options, out);
            }
        }
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            if round(a, options.significant_digits) != round(b, options.significant_digits) {
                out.values_changed.insert(path.to_string(), change(old, new));
            }
        }
        _ if json_type(old) != json_type(new) => {
            out.type_changes.insert(path.to_string(), change(old, new));
        }
        _ => {
            if old != new {
                out.values_changed.insert(path.to_string(), change(old, new));
            }
        }
    }
}

fn compare_ordered(
    path: &str,
    old_items: &[Value],
    new_items: &[Value],
    options: &DiffOptions,
    out: &mut RecordDiff,
) {
    for (i, (a, b)) in old_items.iter().zip(new_items).enumerate() {
        compare(&format!("{path}[{i}]"), a, b, options, out);
    }
    for (i, item) in old_items.iter().enumerate().skip(new_items.len()) {
        record_element(&mut out.fields_removed, format!("{path}[{i}]"), item, options);
    }
    for (i, item) in new_items.iter().enumerate().skip(old_items.len()) {
        record_element(&mut out.fields_added, format!("{path}[{i}]"), item, options);
    }
}

/// Records an unmatched array element unless its path is excluded
fn record_element(
    fields: &mut BTreeMap<String, Value>,
    path: String,
    item: &Value,
    options: &DiffOptions,
) {
    if !options.excluded(&path) {
        fields.insert(path, item.clone());
    }
}

/// Multiset comparison on canonical forms
///
/// Equal lengths fall back to comparing the sorted elements pairwise, so a
/// single changed element shows up as a field-level change. Otherwise the
/// elements missing from either side are reported at their own position.
fn compare_unordered(
    path: &str,
    old_items: &[Value],
    new_items: &[Value],
    options: &DiffOptions,
    out: &mut RecordDiff,
) {
    let canonical_sorted = |items: &[Value]| {
        let mut keyed: Vec<(String, usize)> = items
            .iter()
            .enumerate()
            .map(|(i, item)| (canonical(item, options.significant_digits), i))
            .collect();
        keyed.sort();
        keyed
    };
    let old_keyed = canonical_sorted(old_items);
    let new_keyed = canonical_sorted(new_items);

    let same = old_keyed.len() == new_keyed.len()
        && old_keyed.iter().zip(&new_keyed).all(|(a, b)| a.0 == b.0);
    if same {
        return;
    }

    if old_items.len() == new_items.len() {
        for ((_, i), (_, j)) in old_keyed.iter().zip(&new_keyed) {
            compare(&format!("{path}[{i}]"), &old_items[*i], &new_items[*j], options, out);
        }
        return;
    }

    let mut unmatched: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (key, j) in &new_keyed {
        unmatched.entry(key.as_str()).or_default().push(*j);
    }
    for (key, i) in &old_keyed {
        match unmatched.get_mut(key.as_str()).and_then(Vec::pop) {
            Some(_) => {}
            None => record_element(
                &mut out.fields_removed,
                format!("{path}[{i}]"),
                &old_items[*i],
                options,
            ),
        }
    }
    for j in unmatched.into_values().flatten() {
        record_element(&mut out.fields_added, format!("{path}[{j}]"), &new_items[j], options);
    }
}

fn change(old: &Value, new: &Value) -> Change {
    Change {
        old_value: old.clone(),
        new_value: new.clone(),
    }
}

fn round(value: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits as i32);
    (value * scale).round() / scale
}

/// Order-independent string form with numbers rounded
fn canonical(value: &Value, digits: u32) -> String {
    match value {
        Value::Number(n) => {
            let rounded = round(n.as_f64().unwrap_or(f64::NAN), digits);
            // -0.0 and 0.0 must agree
            format!("{:.*}", digits as usize, rounded + 0.0)
        }
        Value::Array(items) => {
            let mut parts: Vec<String> = items.iter().map(|v| canonical(v, digits)).collect();
            parts.sort();
            format!("[{}]", parts.join(","))
        }
        Value::Object(map) => {
            let mut parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k:?}:{}", canonical(v, digits)))
                .collect();
            parts.sort();
            format!("{{{}}}", parts.join(","))
        }
        other => other.to_string(),
    }
}
