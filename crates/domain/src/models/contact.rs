//! Contact domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// A messageable contact belonging to exactly one client.
///
/// `attributes` is an open map; its value shapes are governed by the
/// client's attribute schema and interpreted through
/// [`crate::models::AttributeValue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Contact {
    pub id: i64,
    pub contact_id: Uuid,
    pub client_id: Uuid,
    /// Unique within (client, phone).
    pub phone: String,
    pub email: Option<String>,
    pub attributes: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Raw attribute lookup; JSON null counts as absent.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }
}

/// Request payload for contact sync (upsert by (client, phone)).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpsertContactRequest {
    #[validate(custom(function = "shared::validation::validate_phone"))]
    pub phone: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,

    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contact_with(attributes: HashMap<String, Value>) -> Contact {
        Contact {
            id: 1,
            contact_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            phone: "+420777111222".into(),
            email: None,
            attributes,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_attribute_null_is_absent() {
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), json!("Ali"));
        attrs.insert("city".to_string(), Value::Null);
        let contact = contact_with(attrs);

        assert_eq!(contact.attribute("name"), Some(&json!("Ali")));
        assert!(contact.attribute("city").is_none());
        assert!(contact.attribute("missing").is_none());
    }

    #[test]
    fn test_upsert_request_validation() {
        let req = UpsertContactRequest {
            phone: "+420777111222".into(),
            email: Some("a@example.com".into()),
            attributes: HashMap::new(),
        };
        assert!(req.validate().is_ok());

        let bad = UpsertContactRequest {
            phone: "nope".into(),
            email: None,
            attributes: HashMap::new(),
        };
        assert!(bad.validate().is_err());
    }
}
