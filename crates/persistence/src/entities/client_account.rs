//! Client account entity (database row mapping).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the client_accounts table. Allowed sender
/// ids are a JSONB array; an empty array permits any sender.
#[derive(Debug, Clone, FromRow)]
pub struct ClientAccountEntity {
    pub id: i64,
    pub client_id: Uuid,
    pub balance: f64,
    pub allowed_senders: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientAccountEntity {
    pub fn senders(&self) -> Vec<String> {
        serde_json::from_value(self.allowed_senders.clone()).unwrap_or_default()
    }
}
