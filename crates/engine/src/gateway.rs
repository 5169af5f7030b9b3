//! SMS provider gateway.
//!
//! Failure classification is a contract of the gateway itself: the
//! provider adapter maps its error codes to `FailureReason` so the rest
//! of the engine never inspects human-readable error text.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use domain::models::FailureReason;

/// Successful provider handoff.
#[derive(Debug, Clone)]
pub struct ProviderAck {
    pub transaction_id: String,
}

/// Rejected or failed provider handoff, already classified.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub reason: FailureReason,
    pub message: String,
}

impl ProviderFailure {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn send(
        &self,
        destination: &str,
        body: &str,
        sender: &str,
        unicode: bool,
    ) -> Result<ProviderAck, ProviderFailure>;
}

/// HTTP adapter for a JSON submit endpoint.
pub struct HttpProviderGateway {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    transaction_id: Option<String>,
    error_code: Option<String>,
    message: Option<String>,
}

impl HttpProviderGateway {
    pub fn new(url: String, api_key: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }

    fn classify_code(code: &str) -> FailureReason {
        match code {
            "invalid_phone" | "invalid_destination" => FailureReason::InvalidPhone,
            "blacklisted" | "blacklisted_phone" => FailureReason::BlacklistedPhone,
            "invalid_sender" | "sender_not_allowed" => FailureReason::InvalidSender,
            "insufficient_credit" => FailureReason::InsufficientCredit,
            "rejected" => FailureReason::ProviderRejected,
            // Unseen provider error shapes stay retryable.
            _ => FailureReason::Unknown,
        }
    }
}

#[async_trait]
impl ProviderGateway for HttpProviderGateway {
    async fn send(
        &self,
        destination: &str,
        body: &str,
        sender: &str,
        unicode: bool,
    ) -> Result<ProviderAck, ProviderFailure> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "destination": destination,
                "body": body,
                "sender": sender,
                "unicode": unicode,
            }))
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    FailureReason::Timeout
                } else {
                    FailureReason::Network
                };
                ProviderFailure::new(reason, e.to_string())
            })?;

        let status = response.status();
        let parsed: SubmitResponse = response.json().await.map_err(|e| {
            ProviderFailure::new(FailureReason::Network, format!("malformed response: {e}"))
        })?;

        if status.is_success() {
            match parsed.transaction_id {
                Some(transaction_id) => {
                    debug!(transaction_id = %transaction_id, "Provider accepted message");
                    Ok(ProviderAck { transaction_id })
                }
                None => Err(ProviderFailure::new(
                    FailureReason::Unknown,
                    "provider accepted without a transaction id",
                )),
            }
        } else {
            let reason = parsed
                .error_code
                .as_deref()
                .map(Self::classify_code)
                .unwrap_or(FailureReason::Unknown);
            Err(ProviderFailure::new(
                reason,
                parsed
                    .message
                    .unwrap_or_else(|| format!("provider returned {status}")),
            ))
        }
    }
}

/// Scripted gateway for tests. Destinations registered with a failure
/// reason fail; everything else succeeds with a sequential transaction
/// id.
#[derive(Default)]
pub struct MockGateway {
    failures: std::sync::Mutex<std::collections::HashMap<String, FailureReason>>,
    sent: std::sync::Mutex<Vec<String>>,
    counter: std::sync::atomic::AtomicU64,
}

impl MockGateway {
    pub fn fail_destination(&self, destination: &str, reason: FailureReason) {
        self.failures
            .lock()
            .unwrap()
            .insert(destination.to_string(), reason);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Destinations actually handed to the gateway, in order.
    pub fn sent_destinations(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderGateway for MockGateway {
    async fn send(
        &self,
        destination: &str,
        _body: &str,
        _sender: &str,
        _unicode: bool,
    ) -> Result<ProviderAck, ProviderFailure> {
        if let Some(reason) = self.failures.lock().unwrap().get(destination).copied() {
            return Err(ProviderFailure::new(reason, "scripted failure"));
        }
        self.sent.lock().unwrap().push(destination.to_string());
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(ProviderAck {
            transaction_id: format!("mock-tx-{n}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_classification() {
        assert_eq!(
            HttpProviderGateway::classify_code("invalid_phone"),
            FailureReason::InvalidPhone
        );
        assert_eq!(
            HttpProviderGateway::classify_code("blacklisted"),
            FailureReason::BlacklistedPhone
        );
        assert_eq!(
            HttpProviderGateway::classify_code("sender_not_allowed"),
            FailureReason::InvalidSender
        );
        assert_eq!(
            HttpProviderGateway::classify_code("some_new_code"),
            FailureReason::Unknown
        );
    }

    #[tokio::test]
    async fn test_mock_gateway_scripted_failure() {
        let gateway = MockGateway::default();
        gateway.fail_destination("+420777111222", FailureReason::InvalidPhone);

        let err = gateway
            .send("+420777111222", "hi", "INFO", false)
            .await
            .unwrap_err();
        assert_eq!(err.reason, FailureReason::InvalidPhone);

        let ack = gateway
            .send("+420777111333", "hi", "INFO", false)
            .await
            .unwrap();
        assert!(ack.transaction_id.starts_with("mock-tx-"));
        assert_eq!(gateway.sent_destinations(), vec!["+420777111333"]);
    }
}
