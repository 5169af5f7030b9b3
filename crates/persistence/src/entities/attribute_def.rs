//! Attribute schema entity (database row mapping).

use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::attribute_schema::ArrayItemProperty;
use domain::models::AttributeDef;

use super::parse_enum;

/// Database row mapping for the attribute_defs table. Enum options and
/// array property declarations are JSONB columns.
#[derive(Debug, Clone, FromRow)]
pub struct AttributeDefEntity {
    pub id: i64,
    pub client_id: Uuid,
    pub key: String,
    pub label: String,
    pub attr_type: String,
    pub options: Value,
    pub item_type: Option<String>,
    pub properties: Value,
    pub required: bool,
}

impl TryFrom<AttributeDefEntity> for AttributeDef {
    type Error = EngineError;

    fn try_from(entity: AttributeDefEntity) -> Result<Self, Self::Error> {
        let options: Vec<String> = serde_json::from_value(entity.options).unwrap_or_default();
        let properties: Vec<ArrayItemProperty> =
            serde_json::from_value(entity.properties).unwrap_or_default();
        Ok(Self {
            client_id: entity.client_id,
            key: entity.key,
            label: entity.label,
            attr_type: parse_enum(&entity.attr_type, "attr_type")?,
            options,
            item_type: entity.item_type,
            properties,
            required: entity.required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::AttributeType;
    use serde_json::json;

    #[test]
    fn test_try_from_enum_def() {
        let entity = AttributeDefEntity {
            id: 1,
            client_id: Uuid::new_v4(),
            key: "tier".into(),
            label: "Tier".into(),
            attr_type: "enum".into(),
            options: json!(["gold", "silver"]),
            item_type: None,
            properties: json!([]),
            required: false,
        };
        let def: AttributeDef = entity.try_into().unwrap();
        assert_eq!(def.attr_type, AttributeType::Enum);
        assert_eq!(def.options, vec!["gold".to_string(), "silver".to_string()]);
    }
}
