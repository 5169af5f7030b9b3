//! Segment predicate compilation.
//!
//! A declarative filter compiles into a predicate over the tagged value
//! representation, validated against the owning client's attribute schema.
//! Counting and fetching both evaluate the same compiled predicate, so a
//! fetch is always a subset of what the matching count counted.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::{EngineError, ValidationDetail};
use crate::models::attribute_schema::{AttributeDef, AttributeType};
use crate::models::attribute_value::AttributeValue;
use crate::models::contact::Contact;
use crate::models::segment::{FilterConfig, FilterLogic, FilterOperator};

/// A compiled, schema-validated audience predicate.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    logic: FilterLogic,
    conditions: Vec<CompiledCondition>,
}

#[derive(Debug, Clone)]
struct CompiledCondition {
    key: String,
    def: AttributeDef,
    op: CompiledOp,
}

#[derive(Debug, Clone)]
enum CompiledOp {
    Equals(AttributeValue),
    NotEquals(AttributeValue),
    Greater(AttributeValue),
    GreaterEqual(AttributeValue),
    Less(AttributeValue),
    LessEqual(AttributeValue),
    Contains(String),
    In(Vec<AttributeValue>),
    IsEmpty,
    Between(AttributeValue, AttributeValue),
    ArrayContains {
        property: Option<String>,
        value: Value,
    },
}

impl CompiledFilter {
    /// Validate a filter against the client schema and compile it.
    ///
    /// Unknown attribute keys yield `SchemaMismatch` carrying every
    /// offending key; operator/type mismatches and malformed condition
    /// values yield `Validation` carrying every violation. Nothing
    /// executes partially.
    pub fn compile(schema: &[AttributeDef], filter: &FilterConfig) -> Result<Self, EngineError> {
        let by_key: HashMap<&str, &AttributeDef> =
            schema.iter().map(|d| (d.key.as_str(), d)).collect();

        let mut unknown_keys = Vec::new();
        let mut violations = Vec::new();
        let mut conditions = Vec::new();

        for condition in &filter.conditions {
            let Some(def) = by_key.get(condition.key.as_str()) else {
                if !unknown_keys.contains(&condition.key) {
                    unknown_keys.push(condition.key.clone());
                }
                continue;
            };
            match compile_condition(def, condition.operator, &condition.value) {
                Ok(op) => conditions.push(CompiledCondition {
                    key: condition.key.clone(),
                    def: (*def).clone(),
                    op,
                }),
                Err(message) => violations.push(ValidationDetail::new(condition.key.clone(), message)),
            }
        }

        if !unknown_keys.is_empty() {
            return Err(EngineError::SchemaMismatch { keys: unknown_keys });
        }
        if !violations.is_empty() {
            return Err(EngineError::Validation(violations));
        }

        Ok(Self {
            logic: filter.logic,
            conditions,
        })
    }

    /// Evaluate the predicate against one contact.
    ///
    /// An empty condition list matches every contact regardless of logic.
    pub fn matches(&self, contact: &Contact) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        match self.logic {
            FilterLogic::And => self.conditions.iter().all(|c| c.matches(contact)),
            FilterLogic::Or => self.conditions.iter().any(|c| c.matches(contact)),
        }
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }
}

fn compile_condition(
    def: &AttributeDef,
    operator: FilterOperator,
    value: &Value,
) -> Result<CompiledOp, String> {
    let cast = |v: &Value| {
        AttributeValue::from_json(def, v)
            .map_err(|_| format!("Value does not match attribute type {}", def.attr_type))
    };

    match operator {
        FilterOperator::Equals => Ok(CompiledOp::Equals(cast(value)?)),
        FilterOperator::NotEquals => Ok(CompiledOp::NotEquals(cast(value)?)),
        FilterOperator::Greater
        | FilterOperator::GreaterEqual
        | FilterOperator::Less
        | FilterOperator::LessEqual => {
            if !is_orderable(def.attr_type) {
                return Err(format!(
                    "Operator {operator} requires a number, integer or date attribute"
                ));
            }
            let cast_value = cast(value)?;
            Ok(match operator {
                FilterOperator::Greater => CompiledOp::Greater(cast_value),
                FilterOperator::GreaterEqual => CompiledOp::GreaterEqual(cast_value),
                FilterOperator::Less => CompiledOp::Less(cast_value),
                _ => CompiledOp::LessEqual(cast_value),
            })
        }
        FilterOperator::Contains => match (def.attr_type, value) {
            (AttributeType::String | AttributeType::Enum, Value::String(s)) => {
                Ok(CompiledOp::Contains(s.to_lowercase()))
            }
            (AttributeType::String | AttributeType::Enum, _) => {
                Err("Operator contains requires a string value".into())
            }
            _ => Err("Operator contains requires a string attribute".into()),
        },
        FilterOperator::In => match value {
            Value::Array(items) if !items.is_empty() => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(cast(item)?);
                }
                Ok(CompiledOp::In(values))
            }
            _ => Err("Operator in requires a non-empty array value".into()),
        },
        FilterOperator::IsEmpty => Ok(CompiledOp::IsEmpty),
        FilterOperator::Between => {
            if !is_orderable(def.attr_type) {
                return Err("Operator between requires a number, integer or date attribute".into());
            }
            match value {
                Value::Array(items) if items.len() == 2 => {
                    Ok(CompiledOp::Between(cast(&items[0])?, cast(&items[1])?))
                }
                _ => Err("Operator between requires a two-element array value".into()),
            }
        }
        FilterOperator::ArrayContains => {
            if def.attr_type != AttributeType::Array {
                return Err("Operator array_contains requires an array attribute".into());
            }
            match value {
                Value::Object(map) => {
                    let property = map
                        .get("property")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    let inner = map.get("value").cloned().unwrap_or(Value::Null);
                    if inner.is_null() {
                        return Err("Operator array_contains requires a value".into());
                    }
                    Ok(CompiledOp::ArrayContains {
                        property,
                        value: inner,
                    })
                }
                Value::Null => Err("Operator array_contains requires a value".into()),
                scalar => Ok(CompiledOp::ArrayContains {
                    property: None,
                    value: scalar.clone(),
                }),
            }
        }
    }
}

fn is_orderable(attr_type: AttributeType) -> bool {
    matches!(
        attr_type,
        AttributeType::Number | AttributeType::Integer | AttributeType::Date
    )
}

impl CompiledCondition {
    /// Absent attributes match only `is_empty`; values that fail the
    /// schema cast match nothing.
    fn matches(&self, contact: &Contact) -> bool {
        let raw = contact.attribute(&self.key);

        if let CompiledOp::IsEmpty = self.op {
            return match raw {
                None => true,
                Some(v) => AttributeValue::from_json(&self.def, v)
                    .map(|tagged| tagged.is_empty())
                    .unwrap_or(false),
            };
        }

        let Some(raw) = raw else {
            return false;
        };
        let Ok(tagged) = AttributeValue::from_json(&self.def, raw) else {
            return false;
        };

        match &self.op {
            CompiledOp::Equals(expected) => tagged == *expected,
            CompiledOp::NotEquals(expected) => tagged != *expected,
            CompiledOp::Greater(bound) => {
                matches!(tagged.compare(bound), Some(std::cmp::Ordering::Greater))
            }
            CompiledOp::GreaterEqual(bound) => matches!(
                tagged.compare(bound),
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
            CompiledOp::Less(bound) => {
                matches!(tagged.compare(bound), Some(std::cmp::Ordering::Less))
            }
            CompiledOp::LessEqual(bound) => matches!(
                tagged.compare(bound),
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
            CompiledOp::Contains(needle) => match &tagged {
                AttributeValue::Str(s) => s.to_lowercase().contains(needle),
                _ => false,
            },
            CompiledOp::In(values) => values.iter().any(|v| *v == tagged),
            CompiledOp::IsEmpty => unreachable!("handled above"),
            CompiledOp::Between(lo, hi) => {
                matches!(
                    tagged.compare(lo),
                    Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                ) && matches!(
                    tagged.compare(hi),
                    Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
                )
            }
            CompiledOp::ArrayContains { property, value } => match &tagged {
                AttributeValue::Array(items) => items.iter().any(|item| match property {
                    Some(name) => item.get(name) == Some(value),
                    None => item.values().any(|v| v == value),
                }),
                _ => false,
            },
        }
    }
}
