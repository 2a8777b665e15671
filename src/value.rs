//! Dynamically-typed metadata values
//!
//! Metadata values form a closed tagged union so they can cross the
//! script/engine boundary and the wire without knowing concrete types
//! up front. Conversions are explicit and fallible; nothing here throws.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors produced when converting foreign values into [`MetaValue`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The source value has no representation in the tagged-value model
    #[error("value of type '{0}' is not representable as metadata")]
    Unrepresentable(String),
    /// A mapping key was not a string
    #[error("metadata keys must be strings")]
    NonStringKey,
    /// Nesting exceeded the sanity limit
    #[error("metadata value nesting exceeds {0} levels")]
    TooDeep(usize),
}

/// Maximum nesting depth accepted when converting foreign values.
pub const MAX_VALUE_DEPTH: usize = 32;

/// A single metadata value stored under a string key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<MetaValue>),
    Dict(HashMap<String, MetaValue>),
    Binary(Vec<u8>),
}

impl MetaValue {
    /// Variant name, used in logs and conversion errors
    pub fn type_name(&self) -> &'static str {
        match self {
            MetaValue::Null => "null",
            MetaValue::Bool(_) => "bool",
            MetaValue::Number(_) => "number",
            MetaValue::String(_) => "string",
            MetaValue::List(_) => "list",
            MetaValue::Dict(_) => "dict",
            MetaValue::Binary(_) => "binary",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetaValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetaValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetaValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a plain (untagged) JSON value into a metadata value.
    ///
    /// JSON has no binary category, so this never yields
    /// [`MetaValue::Binary`].
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ValueError> {
        Self::from_json_depth(value, 0)
    }

    fn from_json_depth(value: &serde_json::Value, depth: usize) -> Result<Self, ValueError> {
        if depth > MAX_VALUE_DEPTH {
            return Err(ValueError::TooDeep(MAX_VALUE_DEPTH));
        }
        match value {
            serde_json::Value::Null => Ok(MetaValue::Null),
            serde_json::Value::Bool(b) => Ok(MetaValue::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(MetaValue::Number)
                .ok_or_else(|| ValueError::Unrepresentable("number".into())),
            serde_json::Value::String(s) => Ok(MetaValue::String(s.clone())),
            serde_json::Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    list.push(Self::from_json_depth(item, depth + 1)?);
                }
                Ok(MetaValue::List(list))
            }
            serde_json::Value::Object(map) => {
                let mut dict = HashMap::with_capacity(map.len());
                for (key, item) in map {
                    dict.insert(key.clone(), Self::from_json_depth(item, depth + 1)?);
                }
                Ok(MetaValue::Dict(dict))
            }
        }
    }

    /// Convert back to plain JSON. Binary payloads become arrays of byte
    /// values since JSON has no binary category.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MetaValue::Null => serde_json::Value::Null,
            MetaValue::Bool(b) => serde_json::Value::Bool(*b),
            MetaValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            MetaValue::String(s) => serde_json::Value::String(s.clone()),
            MetaValue::List(items) => {
                serde_json::Value::Array(items.iter().map(MetaValue::to_json).collect())
            }
            MetaValue::Dict(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            MetaValue::Binary(bytes) => {
                serde_json::Value::Array(bytes.iter().map(|b| (*b).into()).collect())
            }
        }
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

impl From<f64> for MetaValue {
    fn from(n: f64) -> Self {
        MetaValue::Number(n)
    }
}

impl From<i64> for MetaValue {
    fn from(n: i64) -> Self {
        MetaValue::Number(n as f64)
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::String(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::String(s)
    }
}

impl From<Vec<u8>> for MetaValue {
    fn from(bytes: Vec<u8>) -> Self {
        MetaValue::Binary(bytes)
    }
}
