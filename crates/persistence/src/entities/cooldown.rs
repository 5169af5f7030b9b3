//! Cooldown log entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::CooldownEntry;

/// Database row mapping for the cooldown_log table.
#[derive(Debug, Clone, FromRow)]
pub struct CooldownEntity {
    pub id: i64,
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

impl From<CooldownEntity> for CooldownEntry {
    fn from(entity: CooldownEntity) -> Self {
        Self {
            id: entity.id,
            campaign_id: entity.campaign_id,
            contact_id: entity.contact_id,
            sent_at: entity.sent_at,
        }
    }
}
