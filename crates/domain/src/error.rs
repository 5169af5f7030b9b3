//! Domain error taxonomy.

use serde::Serialize;
use thiserror::Error;

/// A single validation violation, field plus human-readable message.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl ValidationDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by the campaign engine.
///
/// Validation and schema errors carry every violation, not just the first;
/// callers present them wholesale.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation failed: {}", format_details(.0))]
    Validation(Vec<ValidationDetail>),

    #[error("Filter references unknown attributes: {}", keys.join(", "))]
    SchemaMismatch { keys: Vec<String> },

    #[error("Unresolved template variables: {}", unresolved.join(", "))]
    TemplateRender { unresolved: Vec<String> },

    #[error("Insufficient balance: required {required:.4}, available {available:.4}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid operation for current status: {0}")]
    StateConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Shorthand for a single-field validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation(vec![ValidationDetail::new(field, message)])
    }
}

fn format_details(details: &[ValidationDetail]) -> String {
    details
        .iter()
        .map(|d| format!("{}: {}", d.field, d.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => EngineError::NotFound("Row not found".into()),
            other => EngineError::Store(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e.message.clone().map(|m| m.to_string()).unwrap_or_default(),
                })
            })
            .collect();
        EngineError::Validation(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_lists_all_violations() {
        let err = EngineError::Validation(vec![
            ValidationDetail::new("segment", "segment matches no contacts"),
            ValidationDetail::new("sender", "sender not permitted"),
        ]);
        let text = err.to_string();
        assert!(text.contains("segment matches no contacts"));
        assert!(text.contains("sender not permitted"));
    }

    #[test]
    fn test_schema_mismatch_display() {
        let err = EngineError::SchemaMismatch {
            keys: vec!["age".into(), "city".into()],
        };
        assert_eq!(
            err.to_string(),
            "Filter references unknown attributes: age, city"
        );
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let err: EngineError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
