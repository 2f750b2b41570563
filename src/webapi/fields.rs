//! Request field schemas.
//!
//! Handlers declare the fields they accept as a `&[FieldSpec]` and bind a
//! JSON request body against it. All field problems are reported together
//! as an `INVALID_FORM_DATA` error keyed by field name.

use crate::error::AppError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Prefix for free-form `extra_data` fields.
pub const EXTRA_DATA_PREFIX: &str = "extra_data.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Boolean,
    /// ISO-8601 date/time. `null` and `""` clear the value.
    DateTime,
    /// JSON document, given either as a string or inline.
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    String(String),
    Boolean(bool),
    DateTime(Option<i64>),
    Json(String),
}

/// Field values that passed validation.
#[derive(Debug, Clone, Default)]
pub struct BoundFields {
    values: BTreeMap<&'static str, FieldValue>,

    /// `extra_data.<key>` fields, keyed without the prefix.
    pub extra_data: BTreeMap<String, Value>,
}

impl BoundFields {
    pub fn string(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(FieldValue::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(FieldValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// `Some(None)` means the field was sent empty.
    pub fn datetime(&self, name: &str) -> Option<Option<i64>> {
        match self.values.get(name) {
            Some(FieldValue::DateTime(t)) => Some(*t),
            _ => None,
        }
    }

    /// The field as JSON text.
    pub fn json(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(FieldValue::Json(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.extra_data.is_empty()
    }
}

/// Decode a request body. An empty body is an empty object.
pub fn parse_body(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::invalid_input("The request body must be a JSON object.")),
        Err(e) => Err(AppError::invalid_input(format!(
            "The request body is not valid JSON: {}",
            e
        ))),
    }
}

/// Bind a body against a schema.
///
/// With `allow_unknown`, `extra_data.<key>` fields are collected into
/// `BoundFields::extra_data`. Other unknown fields are ignored.
pub fn bind_fields(
    body: &Map<String, Value>,
    specs: &[FieldSpec],
    allow_unknown: bool,
) -> Result<BoundFields, AppError> {
    let mut bound = BoundFields::default();
    let mut errors = BTreeMap::new();

    for field in specs {
        match body.get(field.name) {
            None if field.required => {
                errors.insert(field.name.to_string(), "This field is required.".to_string());
            }
            None => {}
            Some(value) => match convert(field, value) {
                Ok(converted) => {
                    bound.values.insert(field.name, converted);
                }
                Err(problem) => {
                    errors.insert(field.name.to_string(), problem);
                }
            },
        }
    }

    if allow_unknown {
        for (name, value) in body {
            if let Some(key) = name.strip_prefix(EXTRA_DATA_PREFIX) {
                if key.is_empty() {
                    errors.insert(name.clone(), "A key name is required.".to_string());
                } else {
                    bound.extra_data.insert(key.to_string(), value.clone());
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(bound)
    } else {
        Err(AppError::invalid_fields(errors))
    }
}

fn convert(field: &FieldSpec, value: &Value) -> Result<FieldValue, String> {
    match field.field_type {
        FieldType::String => match value {
            Value::String(s) => Ok(FieldValue::String(s.clone())),
            Value::Null if !field.required => Ok(FieldValue::String(String::new())),
            _ => Err("This field must be a string.".to_string()),
        },
        FieldType::Boolean => match value {
            Value::Bool(b) => Ok(FieldValue::Boolean(*b)),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "1" | "true" => Ok(FieldValue::Boolean(true)),
                "0" | "false" => Ok(FieldValue::Boolean(false)),
                _ => Err("This field must be a boolean.".to_string()),
            },
            _ => Err("This field must be a boolean.".to_string()),
        },
        FieldType::DateTime => match value {
            Value::Null => Ok(FieldValue::DateTime(None)),
            Value::String(s) if s.trim().is_empty() => Ok(FieldValue::DateTime(None)),
            Value::String(s) => parse_datetime(s)
                .map(|t| FieldValue::DateTime(Some(t)))
                .ok_or_else(|| "This timestamp is not a valid ISO 8601 date/time.".to_string()),
            _ => Err("This timestamp is not a valid ISO 8601 date/time.".to_string()),
        },
        FieldType::Json => match value {
            Value::String(s) => Ok(FieldValue::Json(s.clone())),
            Value::Null => Err("This field must contain JSON.".to_string()),
            other => Ok(FieldValue::Json(other.to_string())),
        },
    }
}

/// Parse an ISO-8601 timestamp into Unix seconds. Values without an
/// offset are taken as UTC.
pub fn parse_datetime(raw: &str) -> Option<i64> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().timestamp());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).timestamp())
}
