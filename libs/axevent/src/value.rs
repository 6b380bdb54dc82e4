use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag of a key-value entry on the event bus wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    #[serde(rename = "int", alias = "integer")]
    Integer,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "bool", alias = "boolean")]
    Boolean,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Integer => f.write_str("int"),
            ValueType::Double => f.write_str("double"),
            ValueType::String => f.write_str("string"),
            ValueType::Boolean => f.write_str("bool"),
        }
    }
}

/// Value of a single key-value entry.
///
/// The variant is the tag: there is no way to hold a string under an
/// integer tag, and getters never coerce between variants (an `Integer(1)`
/// is not a `Double`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Integer(i32),
    Double(f64),
    String(String),
    Boolean(bool),
}

impl TypedValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::Integer(_) => ValueType::Integer,
            TypedValue::Double(_) => ValueType::Double,
            TypedValue::String(_) => ValueType::String,
            TypedValue::Boolean(_) => ValueType::Boolean,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            TypedValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            TypedValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            TypedValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Integer(v) => write!(f, "{v}"),
            TypedValue::Double(v) => write!(f, "{v}"),
            TypedValue::String(v) => f.write_str(v),
            TypedValue::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for TypedValue {
    fn from(v: i32) -> Self {
        TypedValue::Integer(v)
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        TypedValue::Double(v)
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::Boolean(v)
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::String(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::String(v.to_string())
    }
}
