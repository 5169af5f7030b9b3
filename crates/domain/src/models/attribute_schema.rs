//! Per-client contact attribute schema.
//!
//! Each client declares the shape of its contact attributes once; the
//! segment query builder and contact sync both validate against these
//! declarations. Registration replaces the client's whole schema (the
//! operation is idempotent and total).

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::attribute_value::AttributeValue;

/// Declared type of a contact attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Integer,
    Date,
    Boolean,
    Enum,
    Array,
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttributeType::String => "string",
            AttributeType::Number => "number",
            AttributeType::Integer => "integer",
            AttributeType::Date => "date",
            AttributeType::Boolean => "boolean",
            AttributeType::Enum => "enum",
            AttributeType::Array => "array",
        };
        write!(f, "{s}")
    }
}

/// Declared shape of the objects inside an array attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArrayItemProperty {
    pub name: String,
    pub prop_type: AttributeType,
}

/// One attribute declaration for a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AttributeDef {
    pub client_id: Uuid,
    pub key: String,
    pub label: String,
    pub attr_type: AttributeType,
    /// Allowed values when `attr_type` is `Enum`.
    #[serde(default)]
    pub options: Vec<String>,
    /// Element type when `attr_type` is `Array` (objects only for now).
    #[serde(default)]
    pub item_type: Option<String>,
    /// Property declarations for array-of-object attributes.
    #[serde(default)]
    pub properties: Vec<ArrayItemProperty>,
    #[serde(default)]
    pub required: bool,
}

impl AttributeDef {
    /// Whether a tagged value matches this declaration.
    pub fn accepts(&self, value: &AttributeValue) -> bool {
        match (self.attr_type, value) {
            (AttributeType::String, AttributeValue::Str(_)) => true,
            (AttributeType::Enum, AttributeValue::Str(s)) => {
                self.options.is_empty() || self.options.iter().any(|o| o == s)
            }
            (AttributeType::Number, AttributeValue::Num(_)) => true,
            (AttributeType::Integer, AttributeValue::Int(_)) => true,
            (AttributeType::Date, AttributeValue::Date(_)) => true,
            (AttributeType::Boolean, AttributeValue::Bool(_)) => true,
            (AttributeType::Array, AttributeValue::Array(_)) => true,
            _ => false,
        }
    }
}

/// One declaration inside a schema registration payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct AttributeDefPayload {
    #[validate(custom(function = "shared::validation::validate_attribute_key"))]
    pub key: String,

    #[validate(length(min = 1, max = 100, message = "Label must be 1-100 characters"))]
    pub label: String,

    pub attr_type: AttributeType,

    #[serde(default)]
    pub options: Vec<String>,

    #[serde(default)]
    pub item_type: Option<String>,

    #[serde(default)]
    pub properties: Vec<ArrayItemProperty>,

    #[serde(default)]
    pub required: bool,
}

impl AttributeDefPayload {
    /// Enum declarations must carry options; array declarations must carry
    /// property declarations.
    pub fn validate_shape(&self) -> Result<(), ValidationError> {
        match self.attr_type {
            AttributeType::Enum if self.options.is_empty() => {
                let mut err = ValidationError::new("enum_options_required");
                err.message = Some("Enum attributes must declare options".into());
                Err(err)
            }
            AttributeType::Array if self.properties.is_empty() => {
                let mut err = ValidationError::new("array_properties_required");
                err.message = Some("Array attributes must declare item properties".into());
                Err(err)
            }
            _ => Ok(()),
        }
    }

    pub fn into_def(self, client_id: Uuid) -> AttributeDef {
        AttributeDef {
            client_id,
            key: self.key,
            label: self.label,
            attr_type: self.attr_type,
            options: self.options,
            item_type: self.item_type,
            properties: self.properties,
            required: self.required,
        }
    }
}

/// Request payload replacing a client's whole schema.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RegisterSchemaRequest {
    #[validate(length(min = 1, message = "At least one attribute is required"))]
    #[validate(nested)]
    pub attributes: Vec<AttributeDefPayload>,
}

impl RegisterSchemaRequest {
    /// Reject duplicate keys and malformed enum/array declarations.
    pub fn validate_payload(&self) -> Result<(), crate::error::EngineError> {
        use crate::error::{EngineError, ValidationDetail};

        let mut details = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for attr in &self.attributes {
            if !seen.insert(attr.key.as_str()) {
                details.push(ValidationDetail::new(
                    attr.key.clone(),
                    "Duplicate attribute key",
                ));
            }
            if let Err(e) = attr.validate_shape() {
                details.push(ValidationDetail::new(
                    attr.key.clone(),
                    e.message
                        .as_deref()
                        .unwrap_or("Invalid attribute declaration")
                        .to_string(),
                ));
            }
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(details))
        }
    }
}
