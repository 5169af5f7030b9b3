//! Entity definitions (database row mappings).

pub mod attribute_def;
pub mod campaign;
pub mod client_account;
pub mod contact;
pub mod cooldown;
pub mod message;
pub mod saved_segment;

pub use attribute_def::AttributeDefEntity;
pub use campaign::CampaignEntity;
pub use client_account::ClientAccountEntity;
pub use contact::ContactEntity;
pub use cooldown::CooldownEntity;
pub use message::MessageEntity;
pub use saved_segment::SavedSegmentEntity;

use domain::error::EngineError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse a TEXT enum column through the domain's serde names.
pub(crate) fn parse_enum<T: DeserializeOwned>(raw: &str, column: &str) -> Result<T, EngineError> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| EngineError::Store(format!("Unrecognized {column} value: {raw}")))
}

/// Serialize a domain enum into its TEXT column representation.
pub(crate) fn enum_text<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{CampaignStatus, FailureReason};

    #[test]
    fn test_parse_enum_roundtrip() {
        let text = enum_text(&CampaignStatus::Scheduled);
        assert_eq!(text, "scheduled");
        let back: CampaignStatus = parse_enum(&text, "status").unwrap();
        assert_eq!(back, CampaignStatus::Scheduled);
    }

    #[test]
    fn test_parse_enum_rejects_garbage() {
        let result: Result<FailureReason, _> = parse_enum("nonsense", "failure_reason");
        assert!(result.is_err());
    }
}
