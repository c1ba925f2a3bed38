//! # Variable Mapping
//!
//! Work-item payloads arrive as untyped wire variables, each a value plus a
//! type discriminator. The [`VariableMapper`] turns them into [`TypedValue`]s
//! before a handler runs, and back into wire form for completion payloads.
//! Mapping failures are scoped to one work item.

use crate::error::VariableError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A variable as the engine transports it: a JSON value tagged with the
/// engine-side type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableValue {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl VariableValue {
    pub fn new(type_name: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }
}

/// A variable after deserialization, owned by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    Json(serde_json::Value),
}

impl TypedValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Double(value) => Some(*value),
            TypedValue::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }
}

/// Deserialized variables of one work item, keyed by variable name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedVariables {
    values: HashMap<String, TypedValue>,
}

impl TypedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: TypedValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypedValue)> {
        self.values.iter()
    }
}

impl FromIterator<(String, TypedValue)> for TypedVariables {
    fn from_iter<I: IntoIterator<Item = (String, TypedValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Converts wire-level variable representations into typed values and back.
///
/// Implementations may fail per work item; the poller skips only that item.
pub trait VariableMapper: Send + Sync {
    /// Map one wire variable to its typed form.
    fn from_wire(&self, name: &str, value: &VariableValue) -> Result<TypedValue, VariableError>;

    /// Map one typed value back to wire form for outgoing payloads.
    fn to_wire(&self, value: &TypedValue) -> VariableValue;

    /// Map a full raw variable set. The default stops at the first failing
    /// variable, which fails the owning work item.
    fn deserialize(
        &self,
        raw: &HashMap<String, VariableValue>,
    ) -> Result<TypedVariables, VariableError> {
        raw.iter()
            .map(|(name, value)| Ok((name.clone(), self.from_wire(name, value)?)))
            .collect()
    }

    /// Map a typed variable set to the wire representation.
    fn serialize(&self, variables: &TypedVariables) -> HashMap<String, VariableValue> {
        variables
            .iter()
            .map(|(name, value)| (name.clone(), self.to_wire(value)))
            .collect()
    }
}

/// Mapper for the engine's primitive value types.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultVariableMapper;

impl DefaultVariableMapper {
    fn mismatch(name: &str, value: &VariableValue, reason: &str) -> VariableError {
        VariableError::ValueMismatch {
            name: name.to_string(),
            type_name: value.type_name.clone(),
            reason: reason.to_string(),
        }
    }
}

impl VariableMapper for DefaultVariableMapper {
    fn from_wire(&self, name: &str, value: &VariableValue) -> Result<TypedValue, VariableError> {
        if value.value.is_null() {
            return Ok(TypedValue::Null);
        }

        match value.type_name.as_str() {
            "Null" => Ok(TypedValue::Null),
            "Boolean" => value
                .value
                .as_bool()
                .map(TypedValue::Boolean)
                .ok_or_else(|| Self::mismatch(name, value, "expected a boolean")),
            "Integer" | "Long" | "Short" => value
                .value
                .as_i64()
                .map(TypedValue::Integer)
                .ok_or_else(|| Self::mismatch(name, value, "expected an integer")),
            "Double" => value
                .value
                .as_f64()
                .map(TypedValue::Double)
                .ok_or_else(|| Self::mismatch(name, value, "expected a number")),
            "String" => value
                .value
                .as_str()
                .map(|s| TypedValue::String(s.to_string()))
                .ok_or_else(|| Self::mismatch(name, value, "expected a string")),
            "Date" => {
                let raw = value
                    .value
                    .as_str()
                    .ok_or_else(|| Self::mismatch(name, value, "expected a date string"))?;
                DateTime::parse_from_rfc3339(raw)
                    .map(|parsed| TypedValue::Date(parsed.with_timezone(&Utc)))
                    .map_err(|e| Self::mismatch(name, value, &format!("unparseable date: {e}")))
            }
            "Json" => Ok(TypedValue::Json(value.value.clone())),
            other => Err(VariableError::UnsupportedType {
                name: name.to_string(),
                type_name: other.to_string(),
            }),
        }
    }

    fn to_wire(&self, value: &TypedValue) -> VariableValue {
        match value {
            TypedValue::Null => VariableValue::new("Null", serde_json::Value::Null),
            TypedValue::Boolean(v) => VariableValue::new("Boolean", serde_json::json!(v)),
            TypedValue::Integer(v) => VariableValue::new("Long", serde_json::json!(v)),
            TypedValue::Double(v) => VariableValue::new("Double", serde_json::json!(v)),
            TypedValue::String(v) => VariableValue::new("String", serde_json::json!(v)),
            TypedValue::Date(v) => VariableValue::new(
                "Date",
                serde_json::json!(v.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
            ),
            TypedValue::Json(v) => VariableValue::new("Json", v.clone()),
        }
    }
}
