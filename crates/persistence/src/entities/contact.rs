//! Contact entity (database row mapping).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

use domain::models::Contact;

/// Database row mapping for the contacts table. Attributes live in a
/// JSONB column.
#[derive(Debug, Clone, FromRow)]
pub struct ContactEntity {
    pub id: i64,
    pub contact_id: Uuid,
    pub client_id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub attributes: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ContactEntity> for Contact {
    fn from(entity: ContactEntity) -> Self {
        let attributes: HashMap<String, Value> = match entity.attributes {
            Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        Self {
            id: entity.id,
            contact_id: entity.contact_id,
            client_id: entity.client_id,
            phone: entity.phone,
            email: entity.email,
            attributes,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_object_attributes_become_empty_map() {
        let entity = ContactEntity {
            id: 1,
            contact_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            phone: "+420777111222".into(),
            email: None,
            attributes: json!("corrupted"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let contact: Contact = entity.into();
        assert!(contact.attributes.is_empty());
    }

    #[test]
    fn test_attributes_map_carries_over() {
        let entity = ContactEntity {
            id: 1,
            contact_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            phone: "+420777111222".into(),
            email: Some("a@b.cz".into()),
            attributes: json!({"name": "Ali", "age": 30}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let contact: Contact = entity.into();
        assert_eq!(contact.attributes["age"], json!(30));
    }
}
