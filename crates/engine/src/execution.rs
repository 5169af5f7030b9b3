//! Campaign lifecycle operations and one-time execution.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use domain::error::{EngineError, ValidationDetail};
use domain::models::campaign::{CreateCampaignRequest, UpdateCampaignRequest};
use domain::models::{
    Campaign, CampaignChannel, CampaignStatus, CampaignType, Contact, FailureReason,
};
use domain::services::segmentation::CompiledFilter;
use domain::services::template;
use domain::stores::{
    AccountStore, CampaignStore, ContactStore, CooldownStore, MessageStore, SchemaStore,
};
use shared::pagination::{PageParams, Paged};

use crate::config::DispatchConfig;
use crate::dispatch::{Dispatcher, SendContext};

/// Aggregate result of one execution run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub sent: u64,
    pub failed: u64,
    pub total_cost: f64,
    pub mock_mode: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    /// Contacts that would receive the next run (cooldown excluded).
    pub target_count: u64,
    pub segments_per_message: u32,
    pub estimated_total_cost: f64,
}

#[derive(Debug, Clone)]
pub struct PreviewRow {
    pub phone: String,
    pub rendered_message: Option<String>,
    /// Render failure for this contact; the rest of the batch still
    /// previews.
    pub error: Option<String>,
    pub segments: u32,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct MessagePreview {
    pub total_count: u64,
    pub previews: Vec<PreviewRow>,
}

#[derive(Debug, Clone, Default)]
pub struct RetryReport {
    pub queued: u64,
    pub skipped: u64,
    pub skipped_reasons: Vec<String>,
}

pub struct CampaignService {
    schemas: Arc<dyn SchemaStore>,
    contacts: Arc<dyn ContactStore>,
    campaigns: Arc<dyn CampaignStore>,
    messages: Arc<dyn MessageStore>,
    cooldowns: Arc<dyn CooldownStore>,
    accounts: Arc<dyn AccountStore>,
    dispatcher: Arc<Dispatcher>,
    config: DispatchConfig,
}

impl CampaignService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schemas: Arc<dyn SchemaStore>,
        contacts: Arc<dyn ContactStore>,
        campaigns: Arc<dyn CampaignStore>,
        messages: Arc<dyn MessageStore>,
        cooldowns: Arc<dyn CooldownStore>,
        accounts: Arc<dyn AccountStore>,
        dispatcher: Arc<Dispatcher>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            schemas,
            contacts,
            campaigns,
            messages,
            cooldowns,
            accounts,
            dispatcher,
            config,
        }
    }

    async fn compile_for(
        &self,
        client_id: Uuid,
        filter: &domain::models::FilterConfig,
    ) -> Result<CompiledFilter, EngineError> {
        let schema = self.schemas.list_for_client(client_id).await?;
        CompiledFilter::compile(&schema, filter)
    }

    async fn require(&self, campaign_id: Uuid) -> Result<Campaign, EngineError> {
        self.campaigns
            .find(campaign_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Campaign {campaign_id}")))
    }

    /// Current matches minus contacts still in cooldown, in stable
    /// contact-creation order.
    async fn audience(&self, campaign: &Campaign) -> Result<Vec<Contact>, EngineError> {
        let compiled = self
            .compile_for(campaign.client_id, &campaign.segment_filter)
            .await?;
        let matches = self
            .contacts
            .query(campaign.client_id, &compiled, None, 0)
            .await?;
        let cooling = self
            .cooldowns
            .contacts_in_cooldown(campaign.campaign_id, campaign.cooldown_window())
            .await?;
        Ok(matches
            .into_iter()
            .filter(|c| !cooling.contains(&c.contact_id))
            .collect())
    }

    fn unit_price(&self, campaign: &Campaign, segments: u32) -> f64 {
        if campaign.channel == CampaignChannel::Email {
            self.config.email_price
        } else {
            f64::from(segments) * self.config.sms_segment_price
        }
    }

    /// Segments one message would take, rendered best-effort against a
    /// sample contact. No contacts: assume a single segment.
    fn sample_segments(&self, campaign: &Campaign, sample: Option<&Contact>) -> u32 {
        if campaign.channel == CampaignChannel::Email {
            return 1;
        }
        match sample {
            Some(contact) => {
                let rendered = template::render(
                    campaign.message_template.as_deref().unwrap_or(""),
                    contact,
                );
                template::calculate_segments(&template::sanitize_for_sms(&rendered).text).segments
            }
            None => 1,
        }
    }

    // Lifecycle -----------------------------------------------------------

    /// Create a campaign in `draft`. A filter matching zero contacts is
    /// rejected before anything is persisted.
    #[instrument(skip(self, request), fields(client_id = %client_id))]
    pub async fn create(
        &self,
        client_id: Uuid,
        request: CreateCampaignRequest,
    ) -> Result<Campaign, EngineError> {
        request.validate()?;
        request.validate_shape()?;

        let compiled = self.compile_for(client_id, &request.segment_filter).await?;
        let target_count = self.contacts.count(client_id, &compiled).await?;
        if target_count == 0 {
            return Err(EngineError::validation(
                "segment_filter",
                "Segment filter matches no contacts",
            ));
        }

        let now = Utc::now();
        let campaign = Campaign {
            id: 0,
            campaign_id: Uuid::new_v4(),
            client_id,
            name: request.name,
            campaign_type: request.campaign_type,
            channel: request.channel,
            status: CampaignStatus::Draft,
            segment_filter: request.segment_filter,
            message_template: request.message_template,
            email_subject_template: request.email_subject_template,
            email_body_template: request.email_body_template,
            sender: request.sender,
            scheduled_at: request.scheduled_at,
            target_count: target_count as i64,
            sent_count: 0,
            delivered_count: 0,
            failed_count: 0,
            total_cost: 0.0,
            email_sent_count: 0,
            email_failed_count: 0,
            email_total_cost: 0.0,
            check_interval_minutes: request.check_interval_minutes,
            cooldown_days: request.cooldown_days,
            run_start_hour: request.run_start_hour,
            run_end_hour: request.run_end_hour,
            ends_at: request.ends_at,
            next_run_at: None,
            is_test: request.is_test,
            created_at: now,
            updated_at: now,
        };

        let created = self.campaigns.create(campaign).await?;
        info!(campaign_id = %created.campaign_id, target_count, "Campaign created");
        Ok(created)
    }

    /// Edit a draft or paused campaign. A filter change recomputes the
    /// cached target count and is rejected when it matches nothing.
    pub async fn update(
        &self,
        campaign_id: Uuid,
        request: UpdateCampaignRequest,
    ) -> Result<Campaign, EngineError> {
        request.validate()?;
        request.validate_shape()?;

        let mut campaign = self.require(campaign_id).await?;
        campaign.guard(campaign.can_update(), "update")?;

        if let Some(name) = request.name {
            campaign.name = name;
        }
        if let Some(filter) = request.segment_filter {
            let compiled = self.compile_for(campaign.client_id, &filter).await?;
            let count = self.contacts.count(campaign.client_id, &compiled).await?;
            if count == 0 {
                return Err(EngineError::validation(
                    "segment_filter",
                    "Segment filter matches no contacts",
                ));
            }
            campaign.segment_filter = filter;
            campaign.target_count = count as i64;
        }
        if request.message_template.is_some() {
            campaign.message_template = request.message_template;
        }
        if request.email_subject_template.is_some() {
            campaign.email_subject_template = request.email_subject_template;
        }
        if request.email_body_template.is_some() {
            campaign.email_body_template = request.email_body_template;
        }
        if let Some(sender) = request.sender {
            campaign.sender = sender;
        }
        if request.scheduled_at.is_some() {
            campaign.scheduled_at = request.scheduled_at;
        }
        if request.check_interval_minutes.is_some() {
            campaign.check_interval_minutes = request.check_interval_minutes;
        }
        if request.cooldown_days.is_some() {
            campaign.cooldown_days = request.cooldown_days;
        }
        if request.run_start_hour.is_some() {
            campaign.run_start_hour = request.run_start_hour;
        }
        if request.run_end_hour.is_some() {
            campaign.run_end_hour = request.run_end_hour;
        }
        if request.ends_at.is_some() {
            campaign.ends_at = request.ends_at;
        }
        if let (Some(start), Some(end)) = (campaign.run_start_hour, campaign.run_end_hour) {
            if start >= end {
                return Err(EngineError::validation(
                    "run_start_hour",
                    "Run window start must be before its end",
                ));
            }
        }

        campaign.updated_at = Utc::now();
        self.campaigns.update(&campaign).await?;
        Ok(campaign)
    }

    pub async fn delete(&self, campaign_id: Uuid) -> Result<(), EngineError> {
        let campaign = self.require(campaign_id).await?;
        campaign.guard(campaign.can_delete(), "delete")?;
        self.campaigns.delete(campaign_id).await?;
        Ok(())
    }

    pub async fn cancel(&self, campaign_id: Uuid) -> Result<(), EngineError> {
        let campaign = self.require(campaign_id).await?;
        campaign.guard(campaign.can_cancel(), "cancel")?;
        self.campaigns
            .set_status(campaign_id, CampaignStatus::Cancelled)
            .await
    }

    /// Move a draft one-time campaign to `scheduled`.
    pub async fn schedule(
        &self,
        campaign_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Campaign, EngineError> {
        let mut campaign = self.require(campaign_id).await?;
        campaign.guard(
            campaign.campaign_type == CampaignType::OneTime
                && campaign.status == CampaignStatus::Draft,
            "schedule",
        )?;
        campaign.scheduled_at = Some(at);
        campaign.status = CampaignStatus::Scheduled;
        campaign.updated_at = Utc::now();
        self.campaigns.update(&campaign).await?;
        Ok(campaign)
    }

    /// Copy a campaign into a fresh draft with zeroed counters.
    pub async fn duplicate(
        &self,
        campaign_id: Uuid,
        name: String,
    ) -> Result<Campaign, EngineError> {
        let campaign = self.require(campaign_id).await?;
        self.campaigns
            .create(campaign.duplicate(name, Utc::now()))
            .await
    }

    // Inspection ----------------------------------------------------------

    /// Every violation that would stop this campaign from sending, not
    /// just the first.
    pub async fn validate_campaign(
        &self,
        campaign: &Campaign,
        ctx: SendContext,
    ) -> Result<Vec<ValidationDetail>, EngineError> {
        let mut violations = Vec::new();

        let estimate = self.estimate_cost(campaign).await?;
        if estimate.target_count == 0 {
            violations.push(ValidationDetail::new(
                "segment_filter",
                "Segment has no eligible contacts",
            ));
        }

        if !ctx.mock && !campaign.is_test {
            let balance = self.accounts.balance(campaign.client_id).await?;
            if balance < estimate.estimated_total_cost {
                violations.push(ValidationDetail::new(
                    "balance",
                    format!(
                        "Balance {:.4} does not cover estimated cost {:.4}",
                        balance, estimate.estimated_total_cost
                    ),
                ));
            }
        }

        let allowed = self.accounts.allowed_senders(campaign.client_id).await?;
        if !allowed.is_empty() && !allowed.contains(&campaign.sender) {
            violations.push(ValidationDetail::new(
                "sender",
                format!("Sender {} is not permitted for this account", campaign.sender),
            ));
        }

        Ok(violations)
    }

    pub async fn estimate_cost(&self, campaign: &Campaign) -> Result<CostEstimate, EngineError> {
        let audience = self.audience(campaign).await?;
        let segments = self.sample_segments(campaign, audience.first());
        let target_count = audience.len() as u64;
        Ok(CostEstimate {
            target_count,
            segments_per_message: segments,
            estimated_total_cost: target_count as f64 * self.unit_price(campaign, segments),
        })
    }

    /// Side-effect-free preview of the rendered messages. Render
    /// failures are surfaced per row instead of failing the batch.
    pub async fn preview_messages(
        &self,
        campaign_id: Uuid,
        limit: u64,
    ) -> Result<MessagePreview, EngineError> {
        let campaign = self.require(campaign_id).await?;
        let compiled = self
            .compile_for(campaign.client_id, &campaign.segment_filter)
            .await?;
        let total_count = self.contacts.count(campaign.client_id, &compiled).await?;
        let sample = self
            .contacts
            .query(campaign.client_id, &compiled, Some(limit), 0)
            .await?;

        let template_body = campaign.message_template.as_deref().unwrap_or("");
        let previews = sample
            .iter()
            .map(|contact| match template::render_strict(template_body, contact) {
                Ok(rendered) => {
                    let sanitized = template::sanitize_for_sms(&rendered);
                    let segments = template::calculate_segments(&sanitized.text).segments;
                    PreviewRow {
                        phone: contact.phone.clone(),
                        rendered_message: Some(sanitized.text),
                        error: None,
                        segments,
                        cost: self.unit_price(&campaign, segments),
                    }
                }
                Err(e) => PreviewRow {
                    phone: contact.phone.clone(),
                    rendered_message: None,
                    error: Some(e.to_string()),
                    segments: 0,
                    cost: 0.0,
                },
            })
            .collect();

        Ok(MessagePreview {
            total_count,
            previews,
        })
    }

    /// Paginated view of the current non-cooldown audience, exactly who
    /// the next run would target.
    pub async fn planned_messages(
        &self,
        campaign_id: Uuid,
        params: PageParams,
    ) -> Result<Paged<Contact>, EngineError> {
        let campaign = self.require(campaign_id).await?;
        let audience = self.audience(&campaign).await?;
        let total = audience.len() as u64;
        let items = audience
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .collect();
        Ok(Paged::new(items, total, params))
    }

    // Execution -----------------------------------------------------------

    /// Execute a one-time campaign now. Re-resolves the audience,
    /// moves to `sending`, dispatches every remaining contact, then
    /// completes unless a balance pause intervened.
    #[instrument(skip(self), fields(campaign_id = %campaign_id, mock = ctx.mock))]
    pub async fn execute(
        &self,
        campaign_id: Uuid,
        ctx: SendContext,
    ) -> Result<ExecutionReport, EngineError> {
        let campaign = self.require(campaign_id).await?;
        campaign.guard(campaign.can_execute(), "execute")?;

        let moved = self
            .campaigns
            .compare_and_set_status(
                campaign_id,
                &[CampaignStatus::Draft, CampaignStatus::Scheduled],
                CampaignStatus::Sending,
            )
            .await?;
        if !moved {
            return Err(EngineError::StateConflict(
                "Campaign was claimed by a concurrent execution".to_string(),
            ));
        }

        self.run_one_time(&campaign, ctx).await
    }

    /// Dispatch the remaining audience of a campaign already in
    /// `sending` and settle its final status. Also used by the
    /// scheduled-campaign job, which claims the status transition
    /// itself.
    pub async fn run_one_time(
        &self,
        campaign: &Campaign,
        ctx: SendContext,
    ) -> Result<ExecutionReport, EngineError> {
        let audience = self.audience(campaign).await?;
        let contact_ids: Vec<Uuid> = audience.iter().map(|c| c.contact_id).collect();

        let batch = self
            .dispatcher
            .run_batch(campaign.campaign_id, contact_ids, ctx)
            .await;

        // A balance pause wins over completion; the CAS simply loses.
        self.campaigns
            .compare_and_set_status(
                campaign.campaign_id,
                &[CampaignStatus::Sending],
                CampaignStatus::Completed,
            )
            .await?;

        info!(
            campaign_id = %campaign.campaign_id,
            sent = batch.sent,
            failed = batch.failed,
            skipped = batch.skipped,
            "One-time execution finished"
        );
        Ok(ExecutionReport {
            sent: batch.sent,
            failed: batch.failed,
            total_cost: batch.total_cost,
            mock_mode: ctx.mock,
        })
    }

    /// Dispatch one automated run; status handling and `next_run_at`
    /// remain with the scheduler tick.
    pub async fn run_automated(
        &self,
        campaign: &Campaign,
        ctx: SendContext,
    ) -> Result<ExecutionReport, EngineError> {
        let audience = self.audience(campaign).await?;
        let contact_ids: Vec<Uuid> = audience.iter().map(|c| c.contact_id).collect();
        let batch = self
            .dispatcher
            .run_batch(campaign.campaign_id, contact_ids, ctx)
            .await;
        Ok(ExecutionReport {
            sent: batch.sent,
            failed: batch.failed,
            total_cost: batch.total_cost,
            mock_mode: ctx.mock,
        })
    }

    /// Activate an automated campaign: strict-render one sample contact
    /// and check the balance first, then go `active` with a fresh
    /// `next_run_at`.
    pub async fn activate(
        &self,
        campaign_id: Uuid,
        ctx: SendContext,
    ) -> Result<Campaign, EngineError> {
        let mut campaign = self.require(campaign_id).await?;
        campaign.guard(campaign.can_activate(), "activate")?;

        let compiled = self
            .compile_for(campaign.client_id, &campaign.segment_filter)
            .await?;
        let sample = self
            .contacts
            .query(campaign.client_id, &compiled, Some(1), 0)
            .await?;
        let sample = sample.first().ok_or_else(|| {
            EngineError::validation("segment_filter", "Segment filter matches no contacts")
        })?;
        // A broken template must never go active against a whole segment.
        template::render_strict(campaign.message_template.as_deref().unwrap_or(""), sample)?;

        if !ctx.mock && !campaign.is_test {
            let estimate = self.estimate_cost(&campaign).await?;
            let balance = self.accounts.balance(campaign.client_id).await?;
            if balance < estimate.estimated_total_cost {
                return Err(EngineError::InsufficientBalance {
                    required: estimate.estimated_total_cost,
                    available: balance,
                });
            }
        }

        let now = Utc::now();
        campaign.status = CampaignStatus::Active;
        campaign.next_run_at = campaign.next_run_after(now);
        self.campaigns
            .set_status(campaign_id, CampaignStatus::Active)
            .await?;
        self.campaigns
            .set_next_run(campaign_id, campaign.next_run_at)
            .await?;
        info!(campaign_id = %campaign_id, next_run_at = ?campaign.next_run_at, "Campaign activated");
        Ok(campaign)
    }

    /// Pause an active automated campaign. `next_run_at` survives so a
    /// later activation resumes the cadence.
    pub async fn pause(&self, campaign_id: Uuid) -> Result<(), EngineError> {
        let campaign = self.require(campaign_id).await?;
        campaign.guard(campaign.can_pause(), "pause")?;
        self.campaigns
            .set_status(campaign_id, CampaignStatus::Paused)
            .await
    }

    /// Re-enqueue transient failures of this campaign. Permanent
    /// failures (typed, never string-matched) are skipped with a
    /// reason.
    pub async fn retry_failed(
        &self,
        campaign_id: Uuid,
        ctx: SendContext,
    ) -> Result<RetryReport, EngineError> {
        let campaign = self.require(campaign_id).await?;
        campaign.guard(
            matches!(
                campaign.status,
                CampaignStatus::Active | CampaignStatus::Sending | CampaignStatus::Completed
            ),
            "retry",
        )?;

        let failed = self.messages.failed_for_campaign(campaign_id).await?;
        let mut report = RetryReport::default();
        let mut to_retry = Vec::new();
        let mut seen: HashSet<Uuid> = HashSet::new();

        for message in failed {
            if !seen.insert(message.contact_id) {
                continue;
            }
            let reason = message.failure_reason.unwrap_or(FailureReason::Unknown);
            if reason.is_permanent() {
                report.skipped += 1;
                report
                    .skipped_reasons
                    .push(format!("{}: {}", message.contact_id, reason));
            } else {
                to_retry.push(message.contact_id);
            }
        }
        report.queued = to_retry.len() as u64;

        if to_retry.is_empty() {
            return Ok(report);
        }

        // A completed one-time campaign reopens for the retry batch and
        // settles back to completed afterwards.
        let reopened = campaign.status == CampaignStatus::Completed
            && self
                .campaigns
                .compare_and_set_status(
                    campaign_id,
                    &[CampaignStatus::Completed],
                    CampaignStatus::Sending,
                )
                .await?;

        self.dispatcher.run_batch(campaign_id, to_retry, ctx).await;

        if reopened {
            self.campaigns
                .compare_and_set_status(
                    campaign_id,
                    &[CampaignStatus::Sending],
                    CampaignStatus::Completed,
                )
                .await?;
        }

        info!(
            campaign_id = %campaign_id,
            queued = report.queued,
            skipped = report.skipped,
            "Retry pass finished"
        );
        Ok(report)
    }
}
