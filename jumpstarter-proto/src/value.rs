//  VALUE.rs
//
//  Description:
//!   Defines the structured-value wire type used to carry driver call
//!   arguments and return values (§4.1: arguments and return values are
//!   JSON-shaped, bytes never travel through `Value`).

use std::collections::HashMap;

use prost::{Message, Oneof};
use serde_json::{Map, Number, Value as JsonValue};

/// A JSON-shaped value, carried structurally rather than as an opaque
/// string so the dispatcher can validate shape without a second parse.
#[derive(Clone, PartialEq, Message)]
pub struct Value {
    #[prost(tag = "1", oneof = "ValueKind")]
    pub kind: Option<ValueKind>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum ValueKind {
    #[prost(tag = "1", message)]
    Null(Unit),
    #[prost(tag = "2", bool)]
    Bool(bool),
    #[prost(tag = "3", double)]
    Number(f64),
    #[prost(tag = "4", string)]
    String(String),
    #[prost(tag = "5", message)]
    Array(ValueArray),
    #[prost(tag = "6", message)]
    Object(ValueObject),
}

/// A unit marker; prost has no native "empty means present" scalar, so
/// `null` gets a zero-field message the same way the donor represents
/// `CommitReply {}`.
#[derive(Clone, PartialEq, Message)]
pub struct Unit {}

#[derive(Clone, PartialEq, Message)]
pub struct ValueArray {
    #[prost(tag = "1", repeated, message)]
    pub items: Vec<Value>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ValueObject {
    #[prost(tag = "1", repeated, message)]
    pub fields: Vec<ValueField>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ValueField {
    #[prost(tag = "1", required, string)]
    pub key: String,
    #[prost(tag = "2", required, message)]
    pub value: Value,
}

/// Raised when a wire [`Value`] cannot be interpreted, e.g. an `Object`
/// oneof with no discriminator set. Surfaces as `InvalidArgument` per §7.
#[derive(Debug)]
pub struct UnknownDiscriminantError;

impl std::fmt::Display for UnknownDiscriminantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "value carries no recognised discriminant") }
}
impl std::error::Error for UnknownDiscriminantError {}

impl Value {
    pub fn null() -> Self { Self { kind: Some(ValueKind::Null(Unit {})) } }

    /// Converts a `serde_json::Value` into the wire representation.
    pub fn from_json(v: &JsonValue) -> Self {
        let kind = match v {
            JsonValue::Null => ValueKind::Null(Unit {}),
            JsonValue::Bool(b) => ValueKind::Bool(*b),
            JsonValue::Number(n) => ValueKind::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => ValueKind::String(s.clone()),
            JsonValue::Array(items) => ValueKind::Array(ValueArray { items: items.iter().map(Value::from_json).collect() }),
            JsonValue::Object(fields) => ValueKind::Object(ValueObject {
                fields: fields.iter().map(|(k, v)| ValueField { key: k.clone(), value: Value::from_json(v) }).collect(),
            }),
        };
        Self { kind: Some(kind) }
    }

    /// Converts the wire representation back into a `serde_json::Value`.
    ///
    /// # Errors
    /// Fails with [`UnknownDiscriminantError`] if no oneof variant is set
    /// anywhere in the tree (§4.1: "unknown discriminator in a tagged
    /// variant → `InvalidArgument`").
    pub fn into_json(self) -> Result<JsonValue, UnknownDiscriminantError> {
        match self.kind.ok_or(UnknownDiscriminantError)? {
            ValueKind::Null(_) => Ok(JsonValue::Null),
            ValueKind::Bool(b) => Ok(JsonValue::Bool(b)),
            ValueKind::Number(n) => Ok(Number::from_f64(n).map(JsonValue::Number).unwrap_or(JsonValue::Null)),
            ValueKind::String(s) => Ok(JsonValue::String(s)),
            ValueKind::Array(arr) => {
                let mut out = Vec::with_capacity(arr.items.len());
                for item in arr.items {
                    out.push(item.into_json()?);
                }
                Ok(JsonValue::Array(out))
            },
            ValueKind::Object(obj) => {
                let mut out: Map<String, JsonValue> = Map::with_capacity(obj.fields.len());
                for field in obj.fields {
                    out.insert(field.key, field.value.into_json()?);
                }
                Ok(JsonValue::Object(out))
            },
        }
    }
}

impl From<&JsonValue> for Value {
    fn from(v: &JsonValue) -> Self { Value::from_json(v) }
}

/// Convenience for driver implementations that build arguments as a plain
/// map rather than round-tripping through `serde_json`.
pub fn object(fields: HashMap<String, Value>) -> Value {
    Value { kind: Some(ValueKind::Object(ValueObject { fields: fields.into_iter().map(|(key, value)| ValueField { key, value }).collect() })) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_json() {
        let json = serde_json::json!({"voltage": 5.0, "tags": ["a", "b"], "ok": true, "note": null});
        let value = Value::from_json(&json);
        let back = value.into_json().unwrap();
        assert_eq!(json, back);
    }

    #[test]
    fn empty_value_is_unknown_discriminant() {
        let value = Value { kind: None };
        assert!(value.into_json().is_err());
    }
}
