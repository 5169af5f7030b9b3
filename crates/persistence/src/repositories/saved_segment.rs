//! Saved segment repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::SavedSegment;
use domain::stores::SegmentStore;

use crate::entities::SavedSegmentEntity;
use crate::metrics::QueryTimer;

/// Postgres-backed saved segment store.
#[derive(Clone)]
pub struct PgSegmentStore {
    pool: PgPool,
}

impl PgSegmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SegmentStore for PgSegmentStore {
    async fn create(&self, segment: SavedSegment) -> Result<SavedSegment, EngineError> {
        let timer = QueryTimer::new("create_saved_segment");
        let filter = serde_json::to_value(&segment.filter_config)
            .map_err(|e| EngineError::Store(e.to_string()))?;
        let entity = sqlx::query_as::<_, SavedSegmentEntity>(
            r#"
            INSERT INTO saved_segments (segment_id, client_id, name, filter_config)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(segment.segment_id)
        .bind(segment.client_id)
        .bind(&segment.name)
        .bind(filter)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        entity.try_into()
    }

    async fn update(&self, segment: &SavedSegment) -> Result<(), EngineError> {
        let timer = QueryTimer::new("update_saved_segment");
        let filter = serde_json::to_value(&segment.filter_config)
            .map_err(|e| EngineError::Store(e.to_string()))?;
        sqlx::query(
            r#"
            UPDATE saved_segments
            SET name = $2, filter_config = $3, updated_at = NOW()
            WHERE segment_id = $1
            "#,
        )
        .bind(segment.segment_id)
        .bind(&segment.name)
        .bind(filter)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    async fn find(&self, segment_id: Uuid) -> Result<Option<SavedSegment>, EngineError> {
        let timer = QueryTimer::new("find_saved_segment");
        let entity = sqlx::query_as::<_, SavedSegmentEntity>(
            r#"
            SELECT * FROM saved_segments WHERE segment_id = $1
            "#,
        )
        .bind(segment_id)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();
        entity.map(SavedSegment::try_from).transpose()
    }

    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<SavedSegment>, EngineError> {
        let timer = QueryTimer::new("list_saved_segments");
        let rows = sqlx::query_as::<_, SavedSegmentEntity>(
            r#"
            SELECT * FROM saved_segments WHERE client_id = $1 ORDER BY created_at DESC
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        rows.into_iter().map(SavedSegment::try_from).collect()
    }

    async fn delete(&self, segment_id: Uuid) -> Result<bool, EngineError> {
        let timer = QueryTimer::new("delete_saved_segment");
        let result = sqlx::query(
            r#"
            DELETE FROM saved_segments WHERE segment_id = $1
            "#,
        )
        .bind(segment_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }
}
