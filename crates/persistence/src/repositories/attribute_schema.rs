//! Attribute schema repository.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::AttributeDef;
use domain::stores::SchemaStore;

use crate::entities::{enum_text, AttributeDefEntity};
use crate::metrics::QueryTimer;

/// Postgres-backed attribute schema store.
#[derive(Clone)]
pub struct PgSchemaStore {
    pool: PgPool,
}

impl PgSchemaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaStore for PgSchemaStore {
    /// Registration is wholesale: delete the client's declarations and
    /// recreate them in one transaction.
    async fn replace_for_client(
        &self,
        client_id: Uuid,
        defs: Vec<AttributeDef>,
    ) -> Result<(), EngineError> {
        let timer = QueryTimer::new("replace_schema_for_client");
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM attribute_defs WHERE client_id = $1")
            .bind(client_id)
            .execute(&mut *tx)
            .await?;

        for def in &defs {
            sqlx::query(
                r#"
                INSERT INTO attribute_defs
                    (client_id, key, label, attr_type, options, item_type, properties, required)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(client_id)
            .bind(&def.key)
            .bind(&def.label)
            .bind(enum_text(&def.attr_type))
            .bind(serde_json::to_value(&def.options).unwrap_or_default())
            .bind(&def.item_type)
            .bind(serde_json::to_value(&def.properties).unwrap_or_default())
            .bind(def.required)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        timer.record();
        Ok(())
    }

    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<AttributeDef>, EngineError> {
        let timer = QueryTimer::new("list_schema_for_client");
        let rows = sqlx::query_as::<_, AttributeDefEntity>(
            r#"
            SELECT * FROM attribute_defs WHERE client_id = $1 ORDER BY id ASC
            "#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        rows.into_iter().map(AttributeDef::try_from).collect()
    }
}
