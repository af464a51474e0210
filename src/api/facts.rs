//! # Fact Values
//!
//! Annotations, facts and dynamic facts accept arbitrary JSON from clients,
//! while the persisted resources only store strings. `FactValue` makes the
//! narrowing explicit:
//!
//! - Facts and annotations persist the `String` variant only; every other
//!   variant is skipped on write.
//! - Dynamic facts persist every variant as its JSON encoding and are decoded
//!   on read. Decoding is best effort: a stored value that is not valid JSON
//!   comes back as a plain string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Map of arbitrary metadata keyed by name
pub type FactMap = BTreeMap<String, FactValue>;

/// A single fact or annotation value
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FactValue {
    String(String),
    Bool(bool),
    Number(serde_json::Number),
    /// Objects, arrays and null
    Json(serde_json::Value),
}

impl FactValue {
    /// The string payload, if this is the `String` variant
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FactValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// JSON encoding used when the value is persisted as a dynamic fact
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a persisted dynamic fact, falling back to the raw string.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| FactValue::String(raw.to_string()))
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        FactValue::String(value.to_string())
    }
}

impl From<String> for FactValue {
    fn from(value: String) -> Self {
        FactValue::String(value)
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        FactValue::Bool(value)
    }
}

impl From<i64> for FactValue {
    fn from(value: i64) -> Self {
        FactValue::Number(value.into())
    }
}

impl From<serde_json::Value> for FactValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => FactValue::String(s),
            serde_json::Value::Bool(b) => FactValue::Bool(b),
            serde_json::Value::Number(n) => FactValue::Number(n),
            other => FactValue::Json(other),
        }
    }
}

/// Keep only string-valued entries; other variants are dropped.
#[must_use]
pub fn string_entries(map: &FactMap) -> BTreeMap<String, String> {
    map.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_untagged_variants() {
        let map: FactMap = serde_json::from_value(json!({
            "s": "text",
            "b": true,
            "n": 42,
            "o": {"major": "1"},
            "a": [1, 2, 3]
        }))
        .unwrap();
        assert_eq!(map["s"], FactValue::from("text"));
        assert_eq!(map["b"], FactValue::Bool(true));
        assert_eq!(map["n"], FactValue::from(42));
        assert!(matches!(map["o"], FactValue::Json(_)));
        assert!(matches!(map["a"], FactValue::Json(_)));
    }

    #[test]
    fn test_decode_falls_back_to_raw_string() {
        assert_eq!(FactValue::decode("\"foo\""), FactValue::from("foo"));
        assert_eq!(FactValue::decode("foo"), FactValue::from("foo"));
        assert_eq!(
            FactValue::decode(r#"{"name": "bar"}"#),
            FactValue::Json(json!({"name": "bar"}))
        );
        assert_eq!(FactValue::decode("[1,2,3]"), FactValue::Json(json!([1, 2, 3])));
    }

    #[test]
    fn test_encode_then_decode_keeps_quoted_strings() {
        let quoted = FactValue::from("\"bar\"");
        let stored = quoted.encode().unwrap();
        assert_eq!(FactValue::decode(&stored), quoted);
    }

    #[test]
    fn test_string_entries_skips_other_variants() {
        let mut map = FactMap::new();
        map.insert("cloud".to_string(), FactValue::from("cloudscale"));
        map.insert("nodes".to_string(), FactValue::from(3));
        map.insert("ha".to_string(), FactValue::Bool(true));
        let strings = string_entries(&map);
        assert_eq!(strings.len(), 1);
        assert_eq!(strings["cloud"], "cloudscale");
    }
}
