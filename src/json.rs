//! The dynamically typed JSON tree the validator walks.
//!
//! The core does not parse JSON bytes; collaborators hand it a [`JsonValue`]
//! tree, most conveniently converted from a [`serde_json::Value`]. Integers
//! and floats are kept distinct so the validator can be lenient about
//! whole-valued floats where integers are required (`42.0` is an acceptable
//! `int`, `42.5` is not).

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<JsonValue>),
    /// Key/value pairs in document order; duplicate keys are kept as-is.
    Object(Vec<(String, JsonValue)>),
}

impl JsonValue {
    /// JSON-level type name used in diagnostics, e.g. `expected string, got boolean`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Boolean(_) => "boolean",
            JsonValue::Integer(_) => "integer",
            JsonValue::Float(_) => "number",
            JsonValue::String(_) => "string",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        }
    }

    /// Whether this value is a whole number (an integer, or a float with no
    /// fractional part).
    #[must_use]
    pub fn is_integral(&self) -> bool {
        match self {
            JsonValue::Integer(_) => true,
            JsonValue::Float(f) => f.is_finite() && f.fract() == 0.0,
            _ => false,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JsonValue::Integer(i) => Some(*i as f64),
            JsonValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&[(String, JsonValue)]> {
        match self {
            JsonValue::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// First value stored under `key`, for object values.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        match self {
            JsonValue::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for JsonValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => JsonValue::Null,
            serde_json::Value::Bool(b) => JsonValue::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    JsonValue::Integer(i)
                } else {
                    JsonValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => JsonValue::String(s),
            serde_json::Value::Array(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
            serde_json::Value::Object(entries) => JsonValue::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, JsonValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for JsonValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            JsonValue::Null => serializer.serialize_unit(),
            JsonValue::Boolean(b) => serializer.serialize_bool(*b),
            JsonValue::Integer(i) => serializer.serialize_i64(*i),
            JsonValue::Float(f) => serializer.serialize_f64(*f),
            JsonValue::String(s) => serializer.serialize_str(s),
            JsonValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            JsonValue::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_serde_json_distinguishes_numbers() {
        let v = JsonValue::from(json!({"a": 42, "b": 42.5}));
        assert_eq!(v.get("a"), Some(&JsonValue::Integer(42)));
        assert_eq!(v.get("b"), Some(&JsonValue::Float(42.5)));
    }

    #[test]
    fn test_integral_floats() {
        assert!(JsonValue::Integer(42).is_integral());
        assert!(JsonValue::Float(42.0).is_integral());
        assert!(!JsonValue::Float(42.5).is_integral());
        assert!(!JsonValue::String("42".to_string()).is_integral());
        assert!(!JsonValue::Float(f64::INFINITY).is_integral());
    }

    #[test]
    fn test_get_on_non_object() {
        assert_eq!(JsonValue::Null.get("a"), None);
        assert_eq!(JsonValue::Array(vec![]).get("a"), None);
    }

    #[test]
    fn test_roundtrip_through_serde() {
        let v = JsonValue::from(json!({"name": "plains", "tags": [1, 2.5, null, true]}));
        let text = serde_json::to_string(&v).unwrap();
        let back = JsonValue::from(serde_json::from_str::<serde_json::Value>(&text).unwrap());
        assert_eq!(v, back);
    }
}
