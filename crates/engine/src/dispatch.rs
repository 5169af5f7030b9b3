//! Per-contact dispatch pipeline.
//!
//! One `DispatchUnit` is one attempted delivery to one contact for one
//! campaign. Units are independently schedulable tasks gated by the
//! channel rate limiter; the pipeline's steps are hard contracts:
//! status gate, cooldown, strict render, pricing, conditional balance
//! deduction, provider call, atomic counter increments.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinSet;
use tracing::{error, warn};
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::message::NewMessage;
use domain::models::{
    Campaign, CampaignChannel, CampaignStatus, Contact, FailureReason, MessageStatus,
};
use domain::services::template;
use domain::stores::{AccountStore, CampaignStore, ContactStore, CooldownStore, MessageStore};

use crate::config::DispatchConfig;
use crate::gateway::{ProviderFailure, ProviderGateway};
use crate::limiter::ChannelLimiter;

/// Explicit send-mode flag threaded through the whole call chain.
/// Mock mode skips the provider and all balance movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendContext {
    pub mock: bool,
}

impl SendContext {
    pub fn real() -> Self {
        Self { mock: false }
    }

    pub fn mock() -> Self {
        Self { mock: true }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchUnit {
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub ctx: SendContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Campaign no longer accepts dispatch; a no-op, not a failure.
    CampaignInactive,
    ContactMissing,
    InCooldown,
    /// Balance could not cover the unit; the whole campaign was paused.
    BalancePaused,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent { cost: f64 },
    Skipped(SkipReason),
    Failed { reason: FailureReason },
}

/// Aggregate of one batch of units.
#[derive(Debug, Default, Clone)]
pub struct BatchReport {
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    pub total_cost: f64,
    pub balance_paused: bool,
}

struct RenderedBody {
    destination: String,
    body: String,
    unicode: bool,
    segments: i32,
    cost: f64,
}

pub struct Dispatcher {
    campaigns: Arc<dyn CampaignStore>,
    contacts: Arc<dyn ContactStore>,
    messages: Arc<dyn MessageStore>,
    cooldowns: Arc<dyn CooldownStore>,
    accounts: Arc<dyn AccountStore>,
    gateway: Arc<dyn ProviderGateway>,
    limiter: Arc<ChannelLimiter>,
    config: DispatchConfig,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        contacts: Arc<dyn ContactStore>,
        messages: Arc<dyn MessageStore>,
        cooldowns: Arc<dyn CooldownStore>,
        accounts: Arc<dyn AccountStore>,
        gateway: Arc<dyn ProviderGateway>,
        limiter: Arc<ChannelLimiter>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            campaigns,
            contacts,
            messages,
            cooldowns,
            accounts,
            gateway,
            limiter,
            config,
        }
    }

    /// Price one message for one contact on the campaign's channel.
    /// Fails with `TemplateRender` when a placeholder is unresolved.
    fn price_unit(&self, campaign: &Campaign, contact: &Contact) -> Result<RenderedBody, EngineError> {
        if campaign.channel == CampaignChannel::Email {
            let destination = contact.email.clone().ok_or_else(|| {
                EngineError::Validation(vec![domain::error::ValidationDetail::new(
                    "email",
                    "Contact has no email address",
                )])
            })?;
            let subject =
                template::render_strict(campaign.email_subject_template.as_deref().unwrap_or(""), contact)?;
            let body =
                template::render_strict(campaign.email_body_template.as_deref().unwrap_or(""), contact)?;
            return Ok(RenderedBody {
                destination,
                body: format!("{subject}\n{body}"),
                unicode: false,
                segments: 1,
                cost: self.config.email_price,
            });
        }

        // SMS path; "both" campaigns dispatch the SMS leg here.
        let rendered =
            template::render_strict(campaign.message_template.as_deref().unwrap_or(""), contact)?;
        let sanitized = template::sanitize_for_sms(&rendered);
        let count = template::calculate_segments(&sanitized.text);
        Ok(RenderedBody {
            destination: contact.phone.clone(),
            body: sanitized.text,
            unicode: sanitized.requires_unicode,
            segments: count.segments as i32,
            cost: f64::from(count.segments) * self.config.sms_segment_price,
        })
    }

    async fn record_message(
        &self,
        campaign: &Campaign,
        contact: &Contact,
        rendered: Option<&RenderedBody>,
        status: MessageStatus,
        provider_transaction_id: Option<String>,
        error_message: Option<String>,
        failure_reason: Option<FailureReason>,
        mock: bool,
    ) -> Result<(), EngineError> {
        self.messages
            .record(NewMessage {
                campaign_id: campaign.campaign_id,
                contact_id: contact.contact_id,
                client_id: campaign.client_id,
                channel: campaign.channel,
                destination: rendered
                    .map(|r| r.destination.clone())
                    .unwrap_or_else(|| contact.phone.clone()),
                body: rendered.map(|r| r.body.clone()).unwrap_or_default(),
                status,
                segments: rendered.map(|r| r.segments).unwrap_or(0),
                cost: match status {
                    MessageStatus::Sent => rendered.map(|r| r.cost).unwrap_or(0.0),
                    _ => 0.0,
                },
                provider_transaction_id,
                error_message,
                failure_reason,
                is_test: campaign.is_test || mock,
            })
            .await?;
        Ok(())
    }

    /// Run a single unit through the pipeline.
    pub async fn run_unit(&self, unit: &DispatchUnit) -> Result<DispatchOutcome, EngineError> {
        // 1. Status gate. Paused or finished campaigns make new units
        //    no-ops; in-flight units past the balance step still land.
        let campaign = self
            .campaigns
            .find(unit.campaign_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Campaign {}", unit.campaign_id)))?;
        if !campaign.accepts_dispatch() {
            return Ok(DispatchOutcome::Skipped(SkipReason::CampaignInactive));
        }

        let contact = match self.contacts.find_by_contact_id(unit.contact_id).await? {
            Some(contact) => contact,
            None => return Ok(DispatchOutcome::Skipped(SkipReason::ContactMissing)),
        };

        // 2. Cooldown gate.
        let window = campaign.cooldown_window();
        if self
            .cooldowns
            .in_cooldown(campaign.campaign_id, contact.contact_id, window)
            .await?
        {
            return Ok(DispatchOutcome::Skipped(SkipReason::InCooldown));
        }

        // 3./4. Strict render, sanitize, price. Unresolved placeholders
        //       are a permanent per-contact failure.
        let rendered = match self.price_unit(&campaign, &contact) {
            Ok(rendered) => rendered,
            Err(EngineError::TemplateRender { unresolved }) => {
                self.record_message(
                    &campaign,
                    &contact,
                    None,
                    MessageStatus::Failed,
                    None,
                    Some(format!("Unresolved placeholders: {}", unresolved.join(", "))),
                    Some(FailureReason::TemplateError),
                    unit.ctx.mock,
                )
                .await?;
                self.campaigns
                    .increment_failed(campaign.campaign_id, campaign.channel == CampaignChannel::Email)
                    .await?;
                counter!("dispatch_failed_total").increment(1);
                return Ok(DispatchOutcome::Failed {
                    reason: FailureReason::TemplateError,
                });
            }
            Err(EngineError::Validation(details)) => {
                let detail = details
                    .first()
                    .map(|d| d.message.clone())
                    .unwrap_or_else(|| "invalid destination".to_string());
                self.record_message(
                    &campaign,
                    &contact,
                    None,
                    MessageStatus::Failed,
                    None,
                    Some(detail),
                    Some(FailureReason::InvalidPhone),
                    unit.ctx.mock,
                )
                .await?;
                self.campaigns
                    .increment_failed(campaign.campaign_id, campaign.channel == CampaignChannel::Email)
                    .await?;
                counter!("dispatch_failed_total").increment(1);
                return Ok(DispatchOutcome::Failed {
                    reason: FailureReason::InvalidPhone,
                });
            }
            Err(e) => return Err(e),
        };

        // Reserve the cooldown slot before the provider call; this is
        // the race-safe half of the de-duplication contract. The
        // reservation is released on provider failure.
        if !self
            .cooldowns
            .record_if_absent(campaign.campaign_id, contact.contact_id, window)
            .await?
        {
            return Ok(DispatchOutcome::Skipped(SkipReason::InCooldown));
        }

        // 5. Conditional balance deduction. Insufficient balance is a
        //    campaign-level condition: pause the whole campaign.
        if !unit.ctx.mock
            && !self
                .accounts
                .try_deduct(campaign.client_id, rendered.cost)
                .await?
        {
            self.cooldowns
                .release(campaign.campaign_id, contact.contact_id)
                .await?;
            let paused = self
                .campaigns
                .compare_and_set_status(
                    campaign.campaign_id,
                    &[CampaignStatus::Active, CampaignStatus::Sending],
                    CampaignStatus::Paused,
                )
                .await?;
            if paused {
                warn!(
                    campaign_id = %campaign.campaign_id,
                    cost = rendered.cost,
                    "Insufficient balance, campaign paused"
                );
                counter!("dispatch_balance_paused_total").increment(1);
            }
            return Ok(DispatchOutcome::Skipped(SkipReason::BalancePaused));
        }

        // 6. Provider call behind the channel gate, with a hard timeout
        //    so a stuck call cannot hold limiter capacity.
        let outcome = if unit.ctx.mock {
            Ok(crate::gateway::ProviderAck {
                transaction_id: format!("mock-{}", contact.contact_id),
            })
        } else {
            self.limiter.acquire(campaign.channel.limiter_name()).await;
            match tokio::time::timeout(
                Duration::from_secs(self.config.unit_timeout_secs),
                self.gateway.send(
                    &rendered.destination,
                    &rendered.body,
                    &campaign.sender,
                    rendered.unicode,
                ),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderFailure::new(
                    FailureReason::Timeout,
                    format!("no provider response in {}s", self.config.unit_timeout_secs),
                )),
            }
        };

        let is_email = campaign.channel == CampaignChannel::Email;
        match outcome {
            Ok(ack) => {
                self.record_message(
                    &campaign,
                    &contact,
                    Some(&rendered),
                    MessageStatus::Sent,
                    Some(ack.transaction_id),
                    None,
                    None,
                    unit.ctx.mock,
                )
                .await?;
                self.campaigns
                    .increment_sent(campaign.campaign_id, rendered.cost, is_email)
                    .await?;
                counter!("dispatch_sent_total").increment(1);
                Ok(DispatchOutcome::Sent {
                    cost: rendered.cost,
                })
            }
            Err(failure) => {
                // Refund and reopen the cooldown slot; failed sends do
                // not block a retry.
                if !unit.ctx.mock {
                    self.accounts.add(campaign.client_id, rendered.cost).await?;
                }
                self.cooldowns
                    .release(campaign.campaign_id, contact.contact_id)
                    .await?;
                self.record_message(
                    &campaign,
                    &contact,
                    Some(&rendered),
                    MessageStatus::Failed,
                    None,
                    Some(failure.message),
                    Some(failure.reason),
                    unit.ctx.mock,
                )
                .await?;
                self.campaigns
                    .increment_failed(campaign.campaign_id, is_email)
                    .await?;
                counter!("dispatch_failed_total").increment(1);
                Ok(DispatchOutcome::Failed {
                    reason: failure.reason,
                })
            }
        }
    }

    /// Run one unit with a bounded technical-retry budget. Business
    /// outcomes (sent/failed/skipped) are never retried; only store or
    /// transport errors surfaced as `Err` consume the budget, and
    /// exhausting it is logged without touching campaign counters.
    async fn run_unit_with_budget(&self, unit: &DispatchUnit) -> Option<DispatchOutcome> {
        let budget = self.config.exception_budget.max(1);
        for attempt in 1..=budget {
            match self.run_unit(unit).await {
                Ok(outcome) => return Some(outcome),
                Err(e) if attempt < budget => {
                    warn!(
                        campaign_id = %unit.campaign_id,
                        contact_id = %unit.contact_id,
                        attempt,
                        error = %e,
                        "Dispatch unit errored, retrying"
                    );
                }
                Err(e) => {
                    error!(
                        campaign_id = %unit.campaign_id,
                        contact_id = %unit.contact_id,
                        error = %e,
                        "Dispatch unit exhausted its exception budget"
                    );
                    counter!("dispatch_exhausted_total").increment(1);
                }
            }
        }
        None
    }

    /// Dispatch a batch of contacts for one campaign as concurrent
    /// tasks and aggregate the outcomes.
    pub async fn run_batch(
        self: &Arc<Self>,
        campaign_id: Uuid,
        contact_ids: Vec<Uuid>,
        ctx: SendContext,
    ) -> BatchReport {
        let mut tasks: JoinSet<Option<DispatchOutcome>> = JoinSet::new();
        for contact_id in contact_ids {
            let dispatcher = Arc::clone(self);
            let unit = DispatchUnit {
                campaign_id,
                contact_id,
                ctx,
            };
            tasks.spawn(async move { dispatcher.run_unit_with_budget(&unit).await });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(Some(outcome)) => outcome,
                Ok(None) => continue,
                Err(e) => {
                    error!(campaign_id = %campaign_id, error = %e, "Dispatch task panicked");
                    continue;
                }
            };
            match outcome {
                DispatchOutcome::Sent { cost } => {
                    report.sent += 1;
                    report.total_cost += cost;
                }
                DispatchOutcome::Failed { .. } => report.failed += 1,
                DispatchOutcome::Skipped(reason) => {
                    report.skipped += 1;
                    if reason == SkipReason::BalancePaused {
                        report.balance_paused = true;
                    }
                }
            }
        }
        report
    }

    /// Gate rates per channel out of the dispatch config.
    pub fn channel_rates(config: &DispatchConfig) -> HashMap<&'static str, u32> {
        HashMap::from([
            ("sms", config.sms_rate_per_second),
            ("email", config.email_rate_per_second),
        ])
    }
}
