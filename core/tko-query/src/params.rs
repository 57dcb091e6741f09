//! FILENAME: core/tko-query/src/params.rs
//! PURPOSE: The query-parameter bag sent with every TKO RPC.
//! CONTEXT: Header fields, the common filter and the spreadsheet view all
//! contribute keys to the same JSON object. This wrapper keeps the
//! "append to list" / "set if non-empty" conventions in one place.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object of query parameters (condition plus field side information).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParameters(pub Map<String, Value>);

impl QueryParameters {
    pub fn new() -> Self {
        QueryParameters(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Sets a string parameter, skipping empty values.
    pub fn insert_if_nonempty(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        self.0.insert(key.to_string(), Value::String(value.to_string()));
    }

    /// Appends a string to the list stored under `key`, creating it if needed.
    /// Values already present are not duplicated.
    pub fn append_to_list(&mut self, key: &str, value: &str) {
        let entry = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = entry {
            if !list.iter().any(|v| v.as_str() == Some(value)) {
                list.push(Value::String(value.to_string()));
            }
        }
    }

    /// Returns the string list under `key` (non-strings are skipped).
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::Array(list)) => list
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Copies every key of `other` into self, overwriting on collision.
    pub fn merge(&mut self, other: &QueryParameters) {
        for (key, value) in other.0.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for QueryParameters {
    fn from(map: Map<String, Value>) -> Self {
        QueryParameters(map)
    }
}
