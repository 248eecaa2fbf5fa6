//! Ordered parameter maps for action arguments and request bodies.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An insertion-ordered `key -> JSON value` map.
///
/// Backed by `serde_json::Map` with the `preserve_order` feature, so the
/// serialized argument order matches the order keys were added in. This keeps
/// outbound payloads byte-stable across calls, which matters for request
/// signing and log diffing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds parameters from any JSON value. Non-object values (including
    /// `null`) yield an empty map.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    /// Inserts a value, replacing any previous entry under the same key.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`put`](Self::put).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value under `key` when it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Consumes the map into a JSON object value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Parameters> for Value {
    fn from(params: Parameters) -> Self {
        params.into_value()
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
