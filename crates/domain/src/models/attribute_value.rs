//! Tagged attribute values.
//!
//! Contact attributes are stored as open JSON, but every comparison runs
//! against this tagged representation, cast according to the declared
//! schema type. Raw representation quirks (numbers stored as strings,
//! date-only strings) are absorbed here, in one place.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::cmp::Ordering;

use crate::models::attribute_schema::{AttributeDef, AttributeType};

/// A contact attribute value, cast to its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Str(String),
    Num(f64),
    Int(i64),
    Bool(bool),
    Date(DateTime<Utc>),
    Array(Vec<serde_json::Map<String, Value>>),
}

/// Failure to cast a raw JSON value to its declared type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot cast value to {expected}")]
pub struct CastError {
    pub expected: AttributeType,
}

impl AttributeValue {
    /// Cast a raw stored value to the shape declared by `def`.
    pub fn from_json(def: &AttributeDef, raw: &Value) -> Result<Self, CastError> {
        let fail = || CastError {
            expected: def.attr_type,
        };
        match def.attr_type {
            AttributeType::String | AttributeType::Enum => match raw {
                Value::String(s) => Ok(AttributeValue::Str(s.clone())),
                Value::Number(n) => Ok(AttributeValue::Str(n.to_string())),
                Value::Bool(b) => Ok(AttributeValue::Str(b.to_string())),
                _ => Err(fail()),
            },
            AttributeType::Number => match raw {
                Value::Number(n) => n.as_f64().map(AttributeValue::Num).ok_or_else(fail),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(AttributeValue::Num)
                    .map_err(|_| fail()),
                _ => Err(fail()),
            },
            AttributeType::Integer => match raw {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                    .map(AttributeValue::Int)
                    .ok_or_else(fail),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(AttributeValue::Int)
                    .map_err(|_| fail()),
                _ => Err(fail()),
            },
            AttributeType::Boolean => match raw {
                Value::Bool(b) => Ok(AttributeValue::Bool(*b)),
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(AttributeValue::Bool(true)),
                    "false" | "0" => Ok(AttributeValue::Bool(false)),
                    _ => Err(fail()),
                },
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(AttributeValue::Bool(false)),
                    Some(1) => Ok(AttributeValue::Bool(true)),
                    _ => Err(fail()),
                },
                _ => Err(fail()),
            },
            AttributeType::Date => match raw {
                Value::String(s) => parse_date(s).ok_or_else(fail),
                _ => Err(fail()),
            },
            AttributeType::Array => match raw {
                Value::Array(items) => {
                    let mut objects = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::Object(map) => objects.push(map.clone()),
                            _ => return Err(fail()),
                        }
                    }
                    Ok(AttributeValue::Array(objects))
                }
                _ => Err(fail()),
            },
        }
    }

    /// Ordering between two values of the same tagged variant.
    /// Mismatched variants are incomparable.
    pub fn compare(&self, other: &AttributeValue) -> Option<Ordering> {
        match (self, other) {
            (AttributeValue::Str(a), AttributeValue::Str(b)) => Some(a.cmp(b)),
            (AttributeValue::Num(a), AttributeValue::Num(b)) => a.partial_cmp(b),
            (AttributeValue::Int(a), AttributeValue::Int(b)) => Some(a.cmp(b)),
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => Some(a.cmp(b)),
            (AttributeValue::Date(a), AttributeValue::Date(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Whether the value counts as empty for `is_empty` filtering.
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Str(s) => s.trim().is_empty(),
            AttributeValue::Array(items) => items.is_empty(),
            _ => false,
        }
    }
}

/// Accepts RFC3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_date(s: &str) -> Option<AttributeValue> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(AttributeValue::Date(dt.with_timezone(&Utc)));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let dt = date.and_hms_opt(0, 0, 0)?.and_utc();
        return Some(AttributeValue::Date(dt));
    }
    None
}
