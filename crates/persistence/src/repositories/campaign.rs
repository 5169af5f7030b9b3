//! Campaign repository.
//!
//! Counter updates are single-statement atomic increments; status moves
//! used by the dispatch pipeline and the scheduler are conditional
//! updates so concurrent ticks and pauses cannot clobber each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::{Campaign, CampaignStatus};
use domain::stores::CampaignStore;
use shared::pagination::{Paged, PageParams};

use crate::entities::{enum_text, CampaignEntity};
use crate::metrics::QueryTimer;

/// Postgres-backed campaign store.
#[derive(Clone)]
pub struct PgCampaignStore {
    pool: PgPool,
}

impl PgCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignStore for PgCampaignStore {
    async fn create(&self, campaign: Campaign) -> Result<Campaign, EngineError> {
        let timer = QueryTimer::new("create_campaign");
        let filter = serde_json::to_value(&campaign.segment_filter)
            .map_err(|e| EngineError::Store(e.to_string()))?;
        let entity = sqlx::query_as::<_, CampaignEntity>(
            r#"
            INSERT INTO campaigns
                (campaign_id, client_id, name, campaign_type, channel, status,
                 segment_filter, message_template, email_subject_template,
                 email_body_template, sender, scheduled_at, target_count,
                 check_interval_minutes, cooldown_days, run_start_hour,
                 run_end_hour, ends_at, is_test)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19)
            RETURNING *
            "#,
        )
        .bind(campaign.campaign_id)
        .bind(campaign.client_id)
        .bind(&campaign.name)
        .bind(enum_text(&campaign.campaign_type))
        .bind(enum_text(&campaign.channel))
        .bind(enum_text(&campaign.status))
        .bind(filter)
        .bind(&campaign.message_template)
        .bind(&campaign.email_subject_template)
        .bind(&campaign.email_body_template)
        .bind(&campaign.sender)
        .bind(campaign.scheduled_at)
        .bind(campaign.target_count)
        .bind(campaign.check_interval_minutes)
        .bind(campaign.cooldown_days)
        .bind(campaign.run_start_hour)
        .bind(campaign.run_end_hour)
        .bind(campaign.ends_at)
        .bind(campaign.is_test)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        entity.try_into()
    }

    async fn update(&self, campaign: &Campaign) -> Result<(), EngineError> {
        let timer = QueryTimer::new("update_campaign");
        let filter = serde_json::to_value(&campaign.segment_filter)
            .map_err(|e| EngineError::Store(e.to_string()))?;
        sqlx::query(
            r#"
            UPDATE campaigns
            SET name = $2,
                segment_filter = $3,
                message_template = $4,
                email_subject_template = $5,
                email_body_template = $6,
                sender = $7,
                scheduled_at = $8,
                target_count = $9,
                check_interval_minutes = $10,
                cooldown_days = $11,
                run_start_hour = $12,
                run_end_hour = $13,
                ends_at = $14,
                status = $15,
                updated_at = NOW()
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign.campaign_id)
        .bind(&campaign.name)
        .bind(filter)
        .bind(&campaign.message_template)
        .bind(&campaign.email_subject_template)
        .bind(&campaign.email_body_template)
        .bind(&campaign.sender)
        .bind(campaign.scheduled_at)
        .bind(campaign.target_count)
        .bind(campaign.check_interval_minutes)
        .bind(campaign.cooldown_days)
        .bind(campaign.run_start_hour)
        .bind(campaign.run_end_hour)
        .bind(campaign.ends_at)
        .bind(enum_text(&campaign.status))
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    async fn find(&self, campaign_id: Uuid) -> Result<Option<Campaign>, EngineError> {
        let timer = QueryTimer::new("find_campaign");
        let entity = sqlx::query_as::<_, CampaignEntity>(
            r#"
            SELECT * FROM campaigns WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();
        entity.map(Campaign::try_from).transpose()
    }

    async fn list_for_client(
        &self,
        client_id: Uuid,
        params: PageParams,
    ) -> Result<Paged<Campaign>, EngineError> {
        let timer = QueryTimer::new("list_campaigns");
        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM campaigns WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CampaignEntity>(
            r#"
            SELECT * FROM campaigns
            WHERE client_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(client_id)
        .bind(params.limit() as i64)
        .bind(params.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        timer.record();

        let items: Result<Vec<Campaign>, EngineError> =
            rows.into_iter().map(Campaign::try_from).collect();
        Ok(Paged::new(items?, total.0 as u64, params))
    }

    async fn delete(&self, campaign_id: Uuid) -> Result<bool, EngineError> {
        let timer = QueryTimer::new("delete_campaign");
        let result = sqlx::query(
            r#"
            DELETE FROM campaigns WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    async fn set_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> Result<(), EngineError> {
        let timer = QueryTimer::new("set_campaign_status");
        sqlx::query(
            r#"
            UPDATE campaigns SET status = $2, updated_at = NOW() WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .bind(enum_text(&status))
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        campaign_id: Uuid,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<bool, EngineError> {
        let timer = QueryTimer::new("cas_campaign_status");
        let from_texts: Vec<String> = from.iter().map(enum_text).collect();
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2, updated_at = NOW()
            WHERE campaign_id = $1 AND status = ANY($3)
            "#,
        )
        .bind(campaign_id)
        .bind(enum_text(&to))
        .bind(&from_texts)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected() > 0)
    }

    async fn increment_sent(
        &self,
        campaign_id: Uuid,
        cost: f64,
        email: bool,
    ) -> Result<(), EngineError> {
        let timer = QueryTimer::new("increment_campaign_sent");
        if email {
            sqlx::query(
                r#"
                UPDATE campaigns
                SET email_sent_count = email_sent_count + 1,
                    email_total_cost = email_total_cost + $2,
                    sent_count = sent_count + 1,
                    total_cost = total_cost + $2,
                    updated_at = NOW()
                WHERE campaign_id = $1
                "#,
            )
        } else {
            sqlx::query(
                r#"
                UPDATE campaigns
                SET sent_count = sent_count + 1,
                    total_cost = total_cost + $2,
                    updated_at = NOW()
                WHERE campaign_id = $1
                "#,
            )
        }
        .bind(campaign_id)
        .bind(cost)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    async fn increment_failed(&self, campaign_id: Uuid, email: bool) -> Result<(), EngineError> {
        let timer = QueryTimer::new("increment_campaign_failed");
        if email {
            sqlx::query(
                r#"
                UPDATE campaigns
                SET email_failed_count = email_failed_count + 1,
                    failed_count = failed_count + 1,
                    updated_at = NOW()
                WHERE campaign_id = $1
                "#,
            )
        } else {
            sqlx::query(
                r#"
                UPDATE campaigns
                SET failed_count = failed_count + 1, updated_at = NOW()
                WHERE campaign_id = $1
                "#,
            )
        }
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    async fn increment_delivered(&self, campaign_id: Uuid) -> Result<(), EngineError> {
        let timer = QueryTimer::new("increment_campaign_delivered");
        sqlx::query(
            r#"
            UPDATE campaigns
            SET delivered_count = delivered_count + 1, updated_at = NOW()
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    async fn set_next_run(
        &self,
        campaign_id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), EngineError> {
        let timer = QueryTimer::new("set_campaign_next_run");
        sqlx::query(
            r#"
            UPDATE campaigns SET next_run_at = $2, updated_at = NOW() WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .bind(next_run_at)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    async fn claim_due_automated(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, EngineError> {
        let timer = QueryTimer::new("claim_due_automated");
        // Clearing next_run_at inside the same statement makes the claim
        // atomic across concurrent scheduler ticks.
        let rows = sqlx::query_as::<_, CampaignEntity>(
            r#"
            UPDATE campaigns
            SET next_run_at = NULL, updated_at = NOW()
            WHERE campaign_type = 'automated'
              AND status = 'active'
              AND next_run_at IS NOT NULL
              AND next_run_at <= $1
            RETURNING *
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        rows.into_iter().map(Campaign::try_from).collect()
    }

    async fn claim_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, EngineError> {
        let timer = QueryTimer::new("claim_due_scheduled");
        let rows = sqlx::query_as::<_, CampaignEntity>(
            r#"
            UPDATE campaigns
            SET status = 'sending', updated_at = NOW()
            WHERE campaign_type = 'one_time'
              AND status = 'scheduled'
              AND scheduled_at IS NOT NULL
              AND scheduled_at <= $1
            RETURNING *
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        timer.record();
        rows.into_iter().map(Campaign::try_from).collect()
    }
}
