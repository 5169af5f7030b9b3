//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Maximum length of a message template in characters.
const MAX_TEMPLATE_LENGTH: usize = 4096;

/// Maximum length of an alphanumeric sender id (GSM 03.38 limit).
const MAX_ALPHA_SENDER_LENGTH: usize = 11;

lazy_static! {
    // E.164-ish: optional +, 8-15 digits.
    static ref PHONE_RE: Regex = Regex::new(r"^\+?[1-9][0-9]{7,14}$").unwrap();
    static ref ATTRIBUTE_KEY_RE: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]{0,63}$").unwrap();
}

/// Validates an international phone number.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone must be 8-15 digits, optionally prefixed with +".into());
        Err(err)
    }
}

/// Validates a contact attribute key (identifier-shaped, max 64 chars).
pub fn validate_attribute_key(key: &str) -> Result<(), ValidationError> {
    if ATTRIBUTE_KEY_RE.is_match(key) {
        Ok(())
    } else {
        let mut err = ValidationError::new("attribute_key_format");
        err.message =
            Some("Attribute key must start with a letter or underscore (max 64 chars)".into());
        Err(err)
    }
}

/// Validates an hour-of-day value (0-23).
pub fn validate_hour_of_day(hour: i16) -> Result<(), ValidationError> {
    if (0..=23).contains(&hour) {
        Ok(())
    } else {
        let mut err = ValidationError::new("hour_of_day_range");
        err.message = Some("Hour must be between 0 and 23".into());
        Err(err)
    }
}

/// Validates a message template length.
pub fn validate_template_length(template: &str) -> Result<(), ValidationError> {
    if template.chars().count() <= MAX_TEMPLATE_LENGTH {
        Ok(())
    } else {
        let mut err = ValidationError::new("template_length");
        err.message = Some(format!("Template must be at most {MAX_TEMPLATE_LENGTH} characters").into());
        Err(err)
    }
}

/// Validates a sender id: either a phone number or an alphanumeric id
/// of at most 11 characters.
pub fn validate_sender(sender: &str) -> Result<(), ValidationError> {
    let alpha_ok = !sender.is_empty()
        && sender.len() <= MAX_ALPHA_SENDER_LENGTH
        && sender.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ');
    if alpha_ok || PHONE_RE.is_match(sender) {
        Ok(())
    } else {
        let mut err = ValidationError::new("sender_format");
        err.message =
            Some("Sender must be a phone number or an alphanumeric id of at most 11 characters".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone_valid() {
        assert!(validate_phone("+420123456789").is_ok());
        assert!(validate_phone("420123456789").is_ok());
        assert!(validate_phone("12345678").is_ok());
    }

    #[test]
    fn test_validate_phone_invalid() {
        assert!(validate_phone("").is_err());
        assert!(validate_phone("0123").is_err());
        assert!(validate_phone("+12 345").is_err());
        assert!(validate_phone("not-a-phone").is_err());
        assert!(validate_phone("+1234567890123456").is_err());
    }

    #[test]
    fn test_validate_attribute_key() {
        assert!(validate_attribute_key("first_name").is_ok());
        assert!(validate_attribute_key("_internal").is_ok());
        assert!(validate_attribute_key("a1").is_ok());
        assert!(validate_attribute_key("1abc").is_err());
        assert!(validate_attribute_key("has space").is_err());
        assert!(validate_attribute_key("").is_err());
        assert!(validate_attribute_key(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_hour_of_day() {
        assert!(validate_hour_of_day(0).is_ok());
        assert!(validate_hour_of_day(23).is_ok());
        assert!(validate_hour_of_day(24).is_err());
        assert!(validate_hour_of_day(-1).is_err());
    }

    #[test]
    fn test_validate_template_length() {
        assert!(validate_template_length("Hello {{name}}").is_ok());
        assert!(validate_template_length(&"x".repeat(4097)).is_err());
    }

    #[test]
    fn test_validate_sender() {
        assert!(validate_sender("INFO").is_ok());
        assert!(validate_sender("MyShop 24").is_ok());
        assert!(validate_sender("+420777888999").is_ok());
        assert!(validate_sender("").is_err());
        assert!(validate_sender("WAY-TOO-LONG-SENDER").is_err());
    }
}
