//! Campaign entity (database row mapping).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::segment::FilterConfig;
use domain::models::Campaign;

use super::parse_enum;

/// Database row mapping for the campaigns table. Type, channel and
/// status are TEXT columns; the segment filter is JSONB.
#[derive(Debug, Clone, FromRow)]
pub struct CampaignEntity {
    pub id: i64,
    pub campaign_id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub campaign_type: String,
    pub channel: String,
    pub status: String,
    pub segment_filter: Value,
    pub message_template: Option<String>,
    pub email_subject_template: Option<String>,
    pub email_body_template: Option<String>,
    pub sender: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub target_count: i64,
    pub sent_count: i64,
    pub delivered_count: i64,
    pub failed_count: i64,
    pub total_cost: f64,
    pub email_sent_count: i64,
    pub email_failed_count: i64,
    pub email_total_cost: f64,
    pub check_interval_minutes: Option<i32>,
    pub cooldown_days: Option<i32>,
    pub run_start_hour: Option<i16>,
    pub run_end_hour: Option<i16>,
    pub ends_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<CampaignEntity> for Campaign {
    type Error = EngineError;

    fn try_from(entity: CampaignEntity) -> Result<Self, Self::Error> {
        let segment_filter: FilterConfig = serde_json::from_value(entity.segment_filter)
            .map_err(|e| EngineError::Store(format!("Corrupt segment filter: {e}")))?;
        Ok(Self {
            id: entity.id,
            campaign_id: entity.campaign_id,
            client_id: entity.client_id,
            name: entity.name,
            campaign_type: parse_enum(&entity.campaign_type, "campaign_type")?,
            channel: parse_enum(&entity.channel, "channel")?,
            status: parse_enum(&entity.status, "status")?,
            segment_filter,
            message_template: entity.message_template,
            email_subject_template: entity.email_subject_template,
            email_body_template: entity.email_body_template,
            sender: entity.sender,
            scheduled_at: entity.scheduled_at,
            target_count: entity.target_count,
            sent_count: entity.sent_count,
            delivered_count: entity.delivered_count,
            failed_count: entity.failed_count,
            total_cost: entity.total_cost,
            email_sent_count: entity.email_sent_count,
            email_failed_count: entity.email_failed_count,
            email_total_cost: entity.email_total_cost,
            check_interval_minutes: entity.check_interval_minutes,
            cooldown_days: entity.cooldown_days,
            run_start_hour: entity.run_start_hour,
            run_end_hour: entity.run_end_hour,
            ends_at: entity.ends_at,
            next_run_at: entity.next_run_at,
            is_test: entity.is_test,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{CampaignStatus, CampaignType};
    use serde_json::json;

    fn entity() -> CampaignEntity {
        CampaignEntity {
            id: 1,
            campaign_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            name: "Promo".into(),
            campaign_type: "one_time".into(),
            channel: "sms".into(),
            status: "draft".into(),
            segment_filter: json!({"logic": "AND", "conditions": []}),
            message_template: Some("Hi {{name}}".into()),
            email_subject_template: None,
            email_body_template: None,
            sender: "INFO".into(),
            scheduled_at: None,
            target_count: 5,
            sent_count: 0,
            delivered_count: 0,
            failed_count: 0,
            total_cost: 0.0,
            email_sent_count: 0,
            email_failed_count: 0,
            email_total_cost: 0.0,
            check_interval_minutes: None,
            cooldown_days: None,
            run_start_hour: None,
            run_end_hour: None,
            ends_at: None,
            next_run_at: None,
            is_test: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_try_from_parses_enums_and_filter() {
        let campaign: Campaign = entity().try_into().unwrap();
        assert_eq!(campaign.campaign_type, CampaignType::OneTime);
        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert!(campaign.segment_filter.conditions.is_empty());
    }

    #[test]
    fn test_try_from_rejects_bad_status() {
        let mut e = entity();
        e.status = "exploded".into();
        assert!(Campaign::try_from(e).is_err());
    }
}
