//! Saved segment entity (database row mapping).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::segment::FilterConfig;
use domain::models::SavedSegment;

/// Database row mapping for the saved_segments table.
#[derive(Debug, Clone, FromRow)]
pub struct SavedSegmentEntity {
    pub id: i64,
    pub segment_id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub filter_config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<SavedSegmentEntity> for SavedSegment {
    type Error = EngineError;

    fn try_from(entity: SavedSegmentEntity) -> Result<Self, Self::Error> {
        let filter_config: FilterConfig = serde_json::from_value(entity.filter_config)
            .map_err(|e| EngineError::Store(format!("Corrupt filter config: {e}")))?;
        Ok(Self {
            id: entity.id,
            segment_id: entity.segment_id,
            client_id: entity.client_id,
            name: entity.name,
            filter_config,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}
