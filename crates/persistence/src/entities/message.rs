//! Message entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::Message;

use super::parse_enum;

/// Database row mapping for the messages table.
#[derive(Debug, Clone, FromRow)]
pub struct MessageEntity {
    pub id: i64,
    pub message_id: Uuid,
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub client_id: Uuid,
    pub channel: String,
    pub destination: String,
    pub body: String,
    pub status: String,
    pub segments: i32,
    pub cost: f64,
    pub provider_transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub failure_reason: Option<String>,
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MessageEntity> for Message {
    type Error = EngineError;

    fn try_from(entity: MessageEntity) -> Result<Self, Self::Error> {
        let failure_reason = entity
            .failure_reason
            .as_deref()
            .map(|raw| parse_enum(raw, "failure_reason"))
            .transpose()?;
        Ok(Self {
            id: entity.id,
            message_id: entity.message_id,
            campaign_id: entity.campaign_id,
            contact_id: entity.contact_id,
            client_id: entity.client_id,
            channel: parse_enum(&entity.channel, "channel")?,
            destination: entity.destination,
            body: entity.body,
            status: parse_enum(&entity.status, "status")?,
            segments: entity.segments,
            cost: entity.cost,
            provider_transaction_id: entity.provider_transaction_id,
            error_message: entity.error_message,
            failure_reason,
            is_test: entity.is_test,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{FailureReason, MessageStatus};

    #[test]
    fn test_try_from_with_failure_reason() {
        let entity = MessageEntity {
            id: 1,
            message_id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            contact_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            channel: "sms".into(),
            destination: "+420777111222".into(),
            body: "Hi".into(),
            status: "failed".into(),
            segments: 1,
            cost: 0.04,
            provider_transaction_id: None,
            error_message: Some("number blocked".into()),
            failure_reason: Some("blacklisted_phone".into()),
            is_test: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let message: Message = entity.try_into().unwrap();
        assert_eq!(message.status, MessageStatus::Failed);
        assert_eq!(message.failure_reason, Some(FailureReason::BlacklistedPhone));
    }
}
