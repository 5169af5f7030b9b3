//! Scheduled one-time campaign tick.
//!
//! Claims one-time campaigns whose `scheduled_at` has passed by moving
//! them to `sending` in the same statement, then executes them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use domain::stores::CampaignStore;

use super::scheduler::{Job, JobFrequency};
use crate::dispatch::SendContext;
use crate::execution::CampaignService;

pub struct ScheduledCampaignJob {
    campaigns: Arc<dyn CampaignStore>,
    service: Arc<CampaignService>,
    ctx: SendContext,
    tick_minutes: u64,
}

impl ScheduledCampaignJob {
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
impl Job for ScheduledCampaignJob {
    fn name(&self) -> &'static str {
        "scheduled_campaigns"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(self.tick_minutes.max(1))
    }

    async fn execute(&self) -> Result<(), String> {
        let due = self
            .campaigns
            .claim_due_scheduled(Utc::now())
            .await
            .map_err(|e| format!("Failed to claim scheduled campaigns: {e}"))?;

        for campaign in due {
            match self.service.run_one_time(&campaign, self.ctx).await {
                Ok(report) => {
                    info!(
                        campaign_id = %campaign.campaign_id,
                        sent = report.sent,
                        failed = report.failed,
                        cost = report.total_cost,
                        "Scheduled campaign executed"
                    );
                }
                Err(e) => {
                    warn!(campaign_id = %campaign.campaign_id, error = %e, "Scheduled execution failed");
                }
            }
        }

        Ok(())
    }
}
