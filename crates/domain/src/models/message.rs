//! Delivery records and typed failure classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::campaign::CampaignChannel;

/// Lifecycle of one attempted send. Rows are never mutated except for
/// status transitions and webhook-driven delivery confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Typed failure classification, a contract of the provider gateway.
///
/// Permanent reasons are never retried; anything the gateway cannot name
/// maps to `Unknown` and is treated as transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidPhone,
    BlacklistedPhone,
    InvalidSender,
    TemplateError,
    InsufficientCredit,
    ProviderRejected,
    Network,
    Timeout,
    Unknown,
}

impl FailureReason {
    /// Permanent failures are not worth re-enqueuing.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            FailureReason::InvalidPhone
                | FailureReason::BlacklistedPhone
                | FailureReason::InvalidSender
                | FailureReason::TemplateError
        )
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureReason::InvalidPhone => "invalid_phone",
            FailureReason::BlacklistedPhone => "blacklisted_phone",
            FailureReason::InvalidSender => "invalid_sender",
            FailureReason::TemplateError => "template_error",
            FailureReason::InsufficientCredit => "insufficient_credit",
            FailureReason::ProviderRejected => "provider_rejected",
            FailureReason::Network => "network",
            FailureReason::Timeout => "timeout",
            FailureReason::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One attempted delivery to one contact for one campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Message {
    pub id: i64,
    pub message_id: Uuid,
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub client_id: Uuid,
    pub channel: CampaignChannel,
    pub destination: String,
    pub body: String,
    pub status: MessageStatus,
    pub segments: i32,
    pub cost: f64,
    pub provider_transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub failure_reason: Option<FailureReason>,
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for recording a new delivery attempt.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub client_id: Uuid,
    pub channel: CampaignChannel,
    pub destination: String,
    pub body: String,
    pub status: MessageStatus,
    pub segments: i32,
    pub cost: f64,
    pub provider_transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub failure_reason: Option<FailureReason>,
    pub is_test: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_reasons() {
        assert!(FailureReason::InvalidPhone.is_permanent());
        assert!(FailureReason::BlacklistedPhone.is_permanent());
        assert!(FailureReason::InvalidSender.is_permanent());
        assert!(FailureReason::TemplateError.is_permanent());
    }

    #[test]
    fn test_transient_reasons() {
        assert!(!FailureReason::Network.is_permanent());
        assert!(!FailureReason::Timeout.is_permanent());
        assert!(!FailureReason::ProviderRejected.is_permanent());
        assert!(!FailureReason::InsufficientCredit.is_permanent());
        // Unseen provider error shapes default to transient.
        assert!(!FailureReason::Unknown.is_permanent());
    }

    #[test]
    fn test_failure_reason_serialization() {
        assert_eq!(
            serde_json::to_string(&FailureReason::InvalidPhone).unwrap(),
            "\"invalid_phone\""
        );
        let back: FailureReason = serde_json::from_str("\"timeout\"").unwrap();
        assert_eq!(back, FailureReason::Timeout);
    }
}
