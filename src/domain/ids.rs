//! Entity identifier type
//!
//! The Georef API returns `id` either as a string (`"06"`, `"0602801009"`)
//! or, on some deployments, as a bare integer. Both normalize to the same
//! string form so records from two deployments key identically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Entity identifier newtype wrapper
///
/// # Examples
///
/// ```
/// use georef::domain::ids::EntityId;
/// use std::str::FromStr;
///
/// let id = EntityId::from_str("06").unwrap();
/// assert_eq!(id.as_str(), "06");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new EntityId from a string
    ///
    /// Returns `Err` if the id is empty or whitespace only.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Entity ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Extracts the id of an entity record
    ///
    /// Accepts string and integer ids; anything else (missing, null,
    /// floats, nested values) is rejected.
    pub fn from_record(record: &Value) -> Result<Self, String> {
        match record.get("id") {
            Some(Value::String(s)) => Self::new(s.clone()),
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Self::new(n.to_string()),
            Some(other) => Err(format!("Unsupported id value: {other}")),
            None => Err("Record has no 'id' field".to_string()),
        }
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
