//! Dynamic status values.
//!
//! Status codes reported by the device-cloud carry arbitrary scalar values:
//! the same code can be a bool on one product and a number on another, so
//! access is always through fallible typed accessors.

use serde::{Deserialize, Serialize};

/// A dynamically-typed scalar status value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// Boolean value.
    Bool(bool),
    /// Numeric value; integer fidelity is preserved on round-trip.
    Number(serde_json::Number),
    /// String value.
    String(String),
}

impl ScalarValue {
    /// Interpret as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interpret as a float, if numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Interpret as an integer, if numeric and integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Interpret as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a loose JSON value into a scalar, rejecting composites.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(ScalarValue::Bool(*b)),
            serde_json::Value::Number(n) => Some(ScalarValue::Number(n.clone())),
            serde_json::Value::String(s) => Some(ScalarValue::String(s.clone())),
            _ => None,
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Bool(b)
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        ScalarValue::Number(n.into())
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::String(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::String(s)
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Number(n) => write!(f, "{}", n),
            ScalarValue::String(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_round_trip() {
        let values: Vec<ScalarValue> = serde_json::from_str(r#"[true, 25, "cool"]"#).unwrap();
        assert_eq!(values[0].as_bool(), Some(true));
        assert_eq!(values[1].as_i64(), Some(25));
        assert_eq!(values[2].as_str(), Some("cool"));

        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[true,25,"cool"]"#);
    }

    #[test]
    fn test_typed_accessors_are_fallible() {
        let v = ScalarValue::from("on");
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.as_f64(), None);
        assert_eq!(v.as_str(), Some("on"));
    }

    #[test]
    fn test_from_json_rejects_composites() {
        assert!(ScalarValue::from_json(&serde_json::json!({"k": 1})).is_none());
        assert!(ScalarValue::from_json(&serde_json::json!([1])).is_none());
        assert_eq!(
            ScalarValue::from_json(&serde_json::json!(16)),
            Some(ScalarValue::from(16))
        );
    }
}
