//! Ordered browser attribute map
//!
//! Complex matching weights attributes by position, so the map keeps insertion
//! order and is rebuilt in collection order when a submission enters the system.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::constants::attributes::{CANONICAL_ORDER, REQUIRED};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Map<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Parse the JSON text stored in a store or capture row
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in stored order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Rebuild in collection order: known keys first in table order, then
    /// anything unknown in the order it arrived.
    pub fn canonicalize(self) -> Self {
        let mut rest = self.0;
        let mut ordered = Map::with_capacity(rest.len());

        for key in CANONICAL_ORDER {
            if let Some(value) = rest.remove(key) {
                ordered.insert(key.to_string(), value);
            }
        }
        for (key, value) in rest {
            ordered.insert(key, value);
        }

        Self(ordered)
    }

    /// First position whose key is not the canonical key for that position.
    /// Positional weights are misapplied from there on.
    pub fn order_drift(&self) -> Option<(usize, &str)> {
        self.0
            .keys()
            .enumerate()
            .take(CANONICAL_ORDER.len())
            .find(|(i, key)| key.as_str() != CANONICAL_ORDER[*i])
            .map(|(i, key)| (i, key.as_str()))
    }

    /// Required attributes absent from this map
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED
            .iter()
            .copied()
            .filter(|key| !self.0.contains_key(*key))
            .collect()
    }

    /// SHA-256 over the concatenated values, the way the browser client builds
    /// `AttributesHash`.
    pub fn content_hash(&self) -> String {
        let mut joined = String::new();
        for value in self.0.values() {
            joined.push_str(&js_string(value));
        }

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// String conversion with JavaScript `+=` semantics
pub(crate) fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i64),
                    Some(f) => format!("{}", f),
                    None => n.to_string(),
                }
            }
        }
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}
