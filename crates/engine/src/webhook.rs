//! Delivery status webhook handling.
//!
//! Providers post delivery reports keyed by their transaction id.
//! Reports can race the message record's creation, so an unknown id is
//! accepted and dropped, never an error.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info};

use domain::error::EngineError;
use domain::models::{FailureReason, MessageStatus};
use domain::stores::{CampaignStore, MessageStore};

/// Terminal delivery states derived from provider status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryUpdate {
    Delivered,
    Failed(FailureReason),
    /// Intermediate report (buffered, submitted); nothing to record.
    Ignore,
}

/// SMPP-style DLR status codes.
fn map_status_code(code: i32) -> DeliveryUpdate {
    match code {
        1 => DeliveryUpdate::Delivered,
        2 => DeliveryUpdate::Failed(FailureReason::Network),
        16 => DeliveryUpdate::Failed(FailureReason::ProviderRejected),
        _ => DeliveryUpdate::Ignore,
    }
}

pub struct WebhookService {
    messages: Arc<dyn MessageStore>,
    campaigns: Arc<dyn CampaignStore>,
}

impl WebhookService {
    pub fn new(messages: Arc<dyn MessageStore>, campaigns: Arc<dyn CampaignStore>) -> Self {
        Self {
            messages,
            campaigns,
        }
    }

    /// Apply one delivery report. Only messages still in `sent` move;
    /// duplicates and late reports are no-ops.
    pub async fn apply_delivery_status(
        &self,
        provider_transaction_id: &str,
        status_code: i32,
    ) -> Result<(), EngineError> {
        let update = map_status_code(status_code);
        if update == DeliveryUpdate::Ignore {
            return Ok(());
        }

        let message = match self
            .messages
            .find_by_provider_tx(provider_transaction_id)
            .await?
        {
            Some(message) => message,
            None => {
                debug!(
                    provider_transaction_id,
                    status_code, "Delivery report for unknown transaction, dropped"
                );
                counter!("webhook_unknown_tx_total").increment(1);
                return Ok(());
            }
        };

        if message.status != MessageStatus::Sent {
            return Ok(());
        }

        match update {
            DeliveryUpdate::Delivered => {
                self.messages
                    .update_status(message.message_id, MessageStatus::Delivered, None, None)
                    .await?;
                self.campaigns
                    .increment_delivered(message.campaign_id)
                    .await?;
                counter!("webhook_delivered_total").increment(1);
            }
            DeliveryUpdate::Failed(reason) => {
                self.messages
                    .update_status(
                        message.message_id,
                        MessageStatus::Failed,
                        Some(format!("delivery report status {status_code}")),
                        Some(reason),
                    )
                    .await?;
                self.campaigns
                    .increment_failed(message.campaign_id, false)
                    .await?;
                counter!("webhook_failed_total").increment(1);
            }
            DeliveryUpdate::Ignore => unreachable!(),
        }

        info!(
            provider_transaction_id,
            message_id = %message.message_id,
            status_code,
            "Delivery report applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(map_status_code(1), DeliveryUpdate::Delivered);
        assert_eq!(
            map_status_code(2),
            DeliveryUpdate::Failed(FailureReason::Network)
        );
        assert_eq!(
            map_status_code(16),
            DeliveryUpdate::Failed(FailureReason::ProviderRejected)
        );
        // Buffered and submitted reports carry no terminal state.
        assert_eq!(map_status_code(4), DeliveryUpdate::Ignore);
        assert_eq!(map_status_code(8), DeliveryUpdate::Ignore);
    }
}
