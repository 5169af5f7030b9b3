//! Automated campaign tick.
//!
//! Each tick atomically claims active automated campaigns whose
//! `next_run_at` has passed, runs their non-cooldown audience through
//! dispatch, and recomputes `next_run_at`. This job is the sole writer
//! of `next_run_at` once a campaign is active.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use domain::models::CampaignStatus;
use domain::stores::CampaignStore;

use super::scheduler::{Job, JobFrequency};
use crate::dispatch::SendContext;
use crate::execution::CampaignService;

pub struct AutomatedCampaignJob {
    campaigns: Arc<dyn CampaignStore>,
    service: Arc<CampaignService>,
    ctx: SendContext,
    tick_minutes: u64,
}

impl AutomatedCampaignJob {
    pub fn new(
        campaigns: Arc<dyn CampaignStore>,
        service: Arc<CampaignService>,
        ctx: SendContext,
        tick_minutes: u64,
    ) -> Self {
        Self {
            campaigns,
            service,
            ctx,
            tick_minutes,
        }
    }
}

#[async_trait::async_trait]
impl Job for AutomatedCampaignJob {
    fn name(&self) -> &'static str {
        "automated_campaigns"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.tick_minutes.max(1))
    }

    async fn execute(&self) -> Result<(), String> {
        let now = Utc::now();
        let due = self
            .campaigns
            .claim_due_automated(now)
            .await
            .map_err(|e| format!("Failed to claim due campaigns: {e}"))?;

        for campaign in due {
            // Claiming cleared next_run_at; re-check status afterwards
            // since a pause can race the claim.
            let current = match self.campaigns.find(campaign.campaign_id).await {
                Ok(Some(current)) => current,
                Ok(None) => continue,
                Err(e) => {
                    warn!(campaign_id = %campaign.campaign_id, error = %e, "Lost claimed campaign");
                    continue;
                }
            };
            if current.status != CampaignStatus::Active {
                continue;
            }

            if current.ends_at.is_some_and(|ends| now >= ends) {
                if let Err(e) = self
                    .campaigns
                    .set_status(current.campaign_id, CampaignStatus::Completed)
                    .await
                {
                    warn!(campaign_id = %current.campaign_id, error = %e, "Failed to complete campaign");
                }
                info!(campaign_id = %current.campaign_id, "Campaign reached its end date");
                continue;
            }

            if current.in_run_window(now) {
                match self.service.run_automated(&current, self.ctx).await {
                    Ok(report) => {
                        info!(
                            campaign_id = %current.campaign_id,
                            sent = report.sent,
                            failed = report.failed,
                            cost = report.total_cost,
                            "Automated run finished"
                        );
                    }
                    Err(e) => {
                        warn!(campaign_id = %current.campaign_id, error = %e, "Automated run failed");
                    }
                }
            }

            // next_run_after returns None only past ends_at, handled on
            // the next tick.
            let next = current.next_run_after(now);
            if let Err(e) = self.campaigns.set_next_run(current.campaign_id, next).await {
                warn!(campaign_id = %current.campaign_id, error = %e, "Failed to set next run");
            }
        }

        Ok(())
    }
}
