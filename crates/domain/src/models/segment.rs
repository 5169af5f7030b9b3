//! Saved segments and the declarative filter grammar.
//!
//! The filter grammar is deliberately one level deep: a single AND/OR over
//! a flat list of conditions, no nested groups. Persisted saved segments
//! depend on this shape staying stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

/// Combinator applied across all conditions of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterLogic {
    And,
    Or,
}

/// Comparison operator for one filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    /// Case-insensitive substring match on string-typed attributes.
    Contains,
    /// Membership in a list of scalars.
    In,
    /// Attribute absent, null, blank string, or empty array.
    IsEmpty,
    /// Inclusive range; value is a two-element array `[lo, hi]`.
    Between,
    /// For array attributes: some element's property equals the value.
    ArrayContains,
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::Greater => "greater",
            FilterOperator::GreaterEqual => "greater_equal",
            FilterOperator::Less => "less",
            FilterOperator::LessEqual => "less_equal",
            FilterOperator::Contains => "contains",
            FilterOperator::In => "in",
            FilterOperator::IsEmpty => "is_empty",
            FilterOperator::Between => "between",
            FilterOperator::ArrayContains => "array_contains",
        };
        write!(f, "{s}")
    }
}

/// One `{key, operator, value}` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FilterCondition {
    pub key: String,
    pub operator: FilterOperator,
    /// Operator-shaped payload: scalar for comparisons, array for
    /// `in`/`between`, object `{property, value}` for `array_contains`.
    #[serde(default)]
    pub value: Value,
}

/// Declarative audience filter: one AND/OR over a flat condition list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FilterConfig {
    pub logic: FilterLogic,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
}

impl FilterConfig {
    /// A filter with no conditions matches every contact.
    pub fn match_all() -> Self {
        Self {
            logic: FilterLogic::And,
            conditions: Vec::new(),
        }
    }
}

/// A named, reusable audience filter scoped to one client.
///
/// Match counts are always computed live; nothing is cached on the entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SavedSegment {
    pub id: i64,
    pub segment_id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub filter_config: FilterConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for creating a saved segment.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateSegmentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    pub filter_config: FilterConfig,
}

/// Request payload for updating a saved segment.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateSegmentRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    pub filter_config: Option<FilterConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_config_deserialization() {
        let json = r#"{
            "logic": "AND",
            "conditions": [
                {"key": "age", "operator": "greater_equal", "value": 18},
                {"key": "city", "operator": "in", "value": ["Prague", "Brno"]}
            ]
        }"#;

        let filter: FilterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(filter.logic, FilterLogic::And);
        assert_eq!(filter.conditions.len(), 2);
        assert_eq!(filter.conditions[0].operator, FilterOperator::GreaterEqual);
        assert_eq!(filter.conditions[1].value, json!(["Prague", "Brno"]));
    }

    #[test]
    fn test_condition_value_defaults_to_null() {
        let json = r#"{"key": "city", "operator": "is_empty"}"#;
        let cond: FilterCondition = serde_json::from_str(json).unwrap();
        assert!(cond.value.is_null());
    }

    #[test]
    fn test_filter_roundtrip() {
        let filter = FilterConfig {
            logic: FilterLogic::Or,
            conditions: vec![FilterCondition {
                key: "tier".into(),
                operator: FilterOperator::Equals,
                value: json!("gold"),
            }],
        };
        let text = serde_json::to_string(&filter).unwrap();
        let back: FilterConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn test_match_all_has_no_conditions() {
        assert!(FilterConfig::match_all().conditions.is_empty());
    }
}
