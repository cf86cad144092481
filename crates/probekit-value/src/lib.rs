//! # ProbeKit Value
//!
//! Tagged structured value exchanged between native code and page script.
//!
//! The model is deliberately JSON-shaped: null, boolean, number, string,
//! ordered sequence and keyed mapping. Objects remember insertion order so
//! that display output reads the way it was built, but equality is map
//! equality and does not depend on key order. A missing key (`get` returns
//! `None`) is distinct from a key holding [`Value::Null`].
//!
//! Numbers follow script semantics: there is a single numeric type, and
//! integral values encode without a fractional part.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use thiserror::Error;

/// Keyed mapping used by [`Value::Object`].
pub type Map = IndexMap<String, Value>;

/// Largest integer a script number represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Errors produced while decoding values.
#[derive(Error, Debug)]
pub enum ValueError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected {expected}, found {found}")]
    Type {
        expected: &'static str,
        found: &'static str,
    },
}

/// A structured value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map),
}

impl Value {
    /// Build an object from key/value pairs, keeping their order.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build an array from anything convertible to values.
    pub fn array<T, I>(items: I) -> Self
    where
        T: Into<Value>,
        I: IntoIterator<Item = T>,
    {
        Value::Array(items.into_iter().map(Into::into).collect())
    }

    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ValueError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a JSON document from raw bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ValueError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Compact JSON, object keys in insertion order.
    pub fn to_json(&self) -> String {
        // Serializing into a String cannot fail: keys are always strings.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Compact JSON with object keys sorted at every level.
    ///
    /// Equal values always produce equal canonical encodings, so this is the
    /// form to print in assertion messages.
    pub fn to_canonical_json(&self) -> String {
        self.canonicalized().to_json()
    }

    /// Copy of this value with object keys sorted recursively.
    pub fn canonicalized(&self) -> Value {
        match self {
            Value::Array(items) => Value::Array(items.iter().map(Value::canonicalized).collect()),
            Value::Object(map) => {
                let mut sorted: Map = map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.canonicalized()))
                    .collect();
                sorted.sort_keys();
                Value::Object(sorted)
            }
            other => other.clone(),
        }
    }

    /// Name of the variant, as used in type errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as an integer, if it is integral and exactly representable.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) if is_safe_integer(*n) => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up an object member. `None` means absent, not null.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Element of an array.
    pub fn index(&self, index: usize) -> Option<&Value> {
        self.as_array().and_then(|items| items.get(index))
    }

    /// Insert into an object, returning the previous member.
    ///
    /// Fails with a type error when `self` is not an object.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Result<Option<Value>, ValueError> {
        match self {
            Value::Object(map) => Ok(map.insert(key.into(), value)),
            other => Err(ValueError::Type {
                expected: "object",
                found: other.kind(),
            }),
        }
    }

    /// Number of elements or members; zero for scalars.
    pub fn len(&self) -> usize {
        match self {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_safe_integer(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if is_safe_integer(*n) => serializer.serialize_i64(*n as i64),
            Value::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            // NaN and infinities have no JSON spelling; scripts stringify them as null.
            Value::Number(_) => serializer.serialize_unit(),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, Value>()? {
            map.insert(k, v);
        }
        Ok(Value::Object(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) if is_safe_integer(n) => serde_json::Value::from(n as i64),
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

macro_rules! from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Number(v as f64)
                }
            }
        )*
    };
}

from_integer!(i32, i64, u8, u16, u32, u64, usize);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested() -> Value {
        Value::object([
            ("text", Value::from("it worked!")),
            ("ok", Value::from(true)),
            ("status", Value::from(200)),
            ("nothing", Value::Null),
            (
                "items",
                Value::array([Value::from(1.5), Value::from(false), Value::Null]),
            ),
            ("inner", Value::object([("deep", Value::object([("x", Value::from(-3))]))])),
        ])
    }

    #[test]
    fn test_integral_numbers_encode_without_fraction() {
        assert_eq!(Value::from(200).to_json(), "200");
        assert_eq!(Value::from(200.0).to_json(), "200");
        assert_eq!(Value::from(0.25).to_json(), "0.25");
    }

    #[test]
    fn test_non_finite_numbers_encode_as_null() {
        assert_eq!(Value::from(f64::NAN).to_json(), "null");
        assert_eq!(Value::from(f64::INFINITY).to_json(), "null");
    }

    #[test]
    fn test_display_keeps_insertion_order() {
        let value = Value::object([("b", Value::from(1)), ("a", Value::from(2))]);
        assert_eq!(value.to_string(), r#"{"b":1,"a":2}"#);
        assert_eq!(value.to_canonical_json(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_object_equality_ignores_key_order() {
        let left = Value::object([("b", Value::from(1)), ("a", Value::from(2))]);
        let right = Value::object([("a", Value::from(2)), ("b", Value::from(1))]);
        assert_eq!(left, right);
    }

    #[test]
    fn test_absent_is_distinct_from_null() {
        let value = nested();
        assert_eq!(value.get("nothing"), Some(&Value::Null));
        assert_eq!(value.get("missing"), None);
    }

    #[test]
    fn test_nested_value_survives_json() {
        let value = nested();
        let decoded = Value::from_json(&value.to_json()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(decoded.to_canonical_json(), value.to_canonical_json());
    }

    #[test]
    fn test_serde_json_conversion() {
        let from_macro = Value::from(json!({
            "text": "it worked!",
            "ok": true,
            "status": 200,
            "statusText": "OK"
        }));
        let built = Value::object([
            ("text", Value::from("it worked!")),
            ("ok", Value::from(true)),
            ("status", Value::from(200)),
            ("statusText", Value::from("OK")),
        ]);
        assert_eq!(from_macro, built);

        let back: serde_json::Value = built.into();
        assert_eq!(back["status"], json!(200));
    }

    #[test]
    fn test_accessors() {
        let value = nested();
        assert_eq!(value.get("status").and_then(Value::as_i64), Some(200));
        assert_eq!(value.get("text").and_then(Value::as_str), Some("it worked!"));
        assert_eq!(value.get("items").map(Value::len), Some(3));
        assert_eq!(
            value.get("items").and_then(|v| v.index(0)).and_then(Value::as_f64),
            Some(1.5)
        );
        assert!(value.get("ok").and_then(Value::as_bool).unwrap());
    }

    #[test]
    fn test_insert_requires_object() {
        let mut object = Value::Object(Map::new());
        assert!(object.insert("k", Value::from(1)).unwrap().is_none());

        let mut scalar = Value::from(1);
        assert!(matches!(
            scalar.insert("k", Value::Null),
            Err(ValueError::Type { expected: "object", found: "number" })
        ));
    }

    #[test]
    fn test_invalid_json_is_reported() {
        assert!(matches!(Value::from_json("{not json"), Err(ValueError::Json(_))));
    }
}
