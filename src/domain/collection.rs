//! Keyed entity collections

use super::ids::EntityId;
use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map::{self, BTreeMap};

/// A mapping from entity id to entity record
///
/// Ids are unique. When partitions overlap, the record merged last wins;
/// callers merge in submission order so the outcome is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KeyedCollection {
    records: BTreeMap<EntityId, Value>,
}

impl KeyedCollection {
    /// Creates an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection from raw records
    ///
    /// Records without a usable id are skipped and returned so the caller
    /// can report them.
    pub fn from_records(records: impl IntoIterator<Item = Value>) -> (Self, Vec<String>) {
        let mut collection = Self::new();
        let mut rejected = Vec::new();
        for record in records {
            match EntityId::from_record(&record) {
                Ok(id) => {
                    collection.records.insert(id, record);
                }
                Err(e) => rejected.push(e),
            }
        }
        (collection, rejected)
    }

    /// Inserts a record, returning the record it replaced
    pub fn insert(&mut self, id: EntityId, record: Value) -> Option<Value> {
        self.records.insert(id, record)
    }

    /// Merges `other` into self; other's records win on overlap
    ///
    /// Returns the number of ids that were overwritten.
    pub fn merge(&mut self, other: KeyedCollection) -> usize {
        let mut overwritten = 0;
        for (id, record) in other.records {
            if self.records.insert(id, record).is_some() {
                overwritten += 1;
            }
        }
        overwritten
    }

    pub fn get(&self, id: &EntityId) -> Option<&Value> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.records.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, EntityId, Value> {
        self.records.iter()
    }
}

impl IntoIterator for KeyedCollection {
    type Item = (EntityId, Value);
    type IntoIter = btree_map::IntoIter<EntityId, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a KeyedCollection {
    type Item = (&'a EntityId, &'a Value);
    type IntoIter = btree_map::Iter<'a, EntityId, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<(EntityId, Value)> for KeyedCollection {
    fn from_iter<T: IntoIterator<Item = (EntityId, Value)>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
