//! Message repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::message::NewMessage;
use domain::models::{FailureReason, Message, MessageStatus};
use domain::stores::MessageStore;

use crate::entities::{enum_text, MessageEntity};
use crate::metrics::QueryTimer;

/// Postgres-backed message store.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn record(&self, message: NewMessage) -> Result<Message, EngineError> {
        let timer = QueryTimer::new("record_message");
        let entity = sqlx::query_as::<_, MessageEntity>(
            r#"
            INSERT INTO messages
                (message_id, campaign_id, contact_id, client_id, channel,
                 destination, body, status, segments, cost,
                 provider_transaction_id, error_message, failure_reason, is_test)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message.campaign_id)
        .bind(message.contact_id)
        .bind(message.client_id)
        .bind(enum_text(&message.channel))
        .bind(&message.destination)
        .bind(&message.body)
        .bind(enum_text(&message.status))
        .bind(message.segments)
        .bind(message.cost)
        .bind(&message.provider_transaction_id)
        .bind(&message.error_message)
        .bind(message.failure_reason.as_ref().map(enum_text))
        .bind(message.is_test)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        entity.try_into()
    }

    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
        error_message: Option<String>,
        failure_reason: Option<FailureReason>,
    ) -> Result<(), EngineError> {
        let timer = QueryTimer::new("update_message_status");
        sqlx::query(
            r#"
            UPDATE messages
            SET status = $2,
                error_message = COALESCE($3, error_message),
                failure_reason = COALESCE($4, failure_reason),
                updated_at = NOW()
            WHERE message_id = $1
            "#,
        )
        .bind(message_id)
        .bind(enum_text(&status))
        .bind(error_message)
        .bind(failure_reason.as_ref().map(enum_text))
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    async fn find_by_provider_tx(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<Message>, EngineError> {
        let timer = QueryTimer::new("find_message_by_provider_tx");
        let entity = sqlx::query_as::<_, MessageEntity>(
            r#"
            SELECT * FROM messages WHERE provider_transaction_id = $1
            "#,
        )
        .bind(provider_transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();
        entity.map(Message::try_from).transpose()
    }

    async fn list_for_campaign(
        &self,
        campaign_id: Uuid,
        cursor: Option<(DateTime<Utc>, i64)>,
        limit: u64,
    ) -> Result<Vec<Message>, EngineError> {
        let timer = QueryTimer::new("list_messages_for_campaign");
        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query_as::<_, MessageEntity>(
                    r#"
                    SELECT * FROM messages
                    WHERE campaign_id = $1 AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(campaign_id)
                .bind(created_at)
                .bind(id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, MessageEntity>(
                    r#"
                    SELECT * FROM messages
                    WHERE campaign_id = $1
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(campaign_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };
        timer.record();
        rows.into_iter().map(Message::try_from).collect()
    }

    async fn failed_for_campaign(&self, campaign_id: Uuid) -> Result<Vec<Message>, EngineError> {
        let timer = QueryTimer::new("failed_messages_for_campaign");
        let rows = sqlx::query_as::<_, MessageEntity>(
            r#"
            SELECT * FROM messages
            WHERE campaign_id = $1 AND status = 'failed'
            ORDER BY id ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        rows.into_iter().map(Message::try_from).collect()
    }
}
