//! Template rendering, SMS sanitization and segment arithmetic.
//!
//! `{{attribute}}` placeholders resolve against one contact's attribute
//! map. Strict rendering fails loudly on any unresolved name and must run
//! before every real send and before campaign activation; best-effort
//! rendering is for non-binding previews only.
//!
//! Segment arithmetic drives billing: GSM-7 packs 160 chars into a single
//! segment and 153 per segment when multi-part; UCS-2 packs 70 and 67.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use crate::error::EngineError;
use crate::models::contact::Contact;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex =
        Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\}\}").unwrap();

    /// GSM 03.38 basic character set (1 septet each).
    static ref GSM_BASIC: HashSet<char> = {
        let mut set: HashSet<char> = ('a'..='z').chain('A'..='Z').chain('0'..='9').collect();
        for c in "@£$¥èéùìòÇØøÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./:;<=>?¡ÄÖÑܧ¿äöñüà\r\n".chars() {
            set.insert(c);
        }
        set
    };

    /// GSM 03.38 extension table (escape-prefixed, 2 septets each).
    static ref GSM_EXTENDED: HashSet<char> =
        "^{}\\[~]|€".chars().collect();
}

/// SMS encoding selected for a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsEncoding {
    Gsm7,
    Ucs2,
}

/// Result of sanitizing a body for the SMS channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedText {
    pub text: String,
    /// True when characters outside the GSM-7 repertoire remain and the
    /// message must go out as UCS-2.
    pub requires_unicode: bool,
}

/// Segment count and encoding for a message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentCount {
    pub segments: u32,
    pub encoding: SmsEncoding,
}

/// Best-effort render: unresolved placeholders become empty strings.
pub fn render(template: &str, contact: &Contact) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            contact
                .attribute(&caps[1])
                .and_then(format_value)
                .unwrap_or_default()
        })
        .into_owned()
}

/// Strict render: fails with every unresolved placeholder name if any
/// placeholder's key is absent (or unrenderable) in the contact's
/// attributes.
pub fn render_strict(template: &str, contact: &Contact) -> Result<String, EngineError> {
    let mut unresolved = Vec::new();
    let rendered = PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            match contact.attribute(&caps[1]).and_then(format_value) {
                Some(text) => text,
                None => {
                    let key = caps[1].to_string();
                    if !unresolved.contains(&key) {
                        unresolved.push(key);
                    }
                    String::new()
                }
            }
        })
        .into_owned();

    if unresolved.is_empty() {
        Ok(rendered)
    } else {
        Err(EngineError::TemplateRender { unresolved })
    }
}

/// Placeholder names referenced by a template, in order of appearance.
pub fn placeholder_names(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let key = caps[1].to_string();
        if !names.contains(&key) {
            names.push(key);
        }
    }
    names
}

/// Scalar formatting for placeholder substitution. Arrays and objects
/// have no scalar rendering and count as unresolved.
fn format_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Map common non-GSM lookalikes into the GSM-7 repertoire and flag
/// whether Unicode encoding is still required afterwards.
pub fn sanitize_for_sms(text: &str) -> SanitizedText {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => out.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2015}' => out.push('-'),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2009}' | '\u{200A}' | '\u{2002}' | '\u{2003}' => out.push(' '),
            '\u{200B}' | '\u{FEFF}' => {}
            other => out.push(other),
        }
    }
    let requires_unicode = !is_gsm7(&out);
    SanitizedText {
        text: out,
        requires_unicode,
    }
}

/// Whether every character fits the GSM-7 repertoire (basic or extension).
pub fn is_gsm7(text: &str) -> bool {
    text.chars()
        .all(|c| GSM_BASIC.contains(&c) || GSM_EXTENDED.contains(&c))
}

/// Septet length of a GSM-7 body; extension characters cost 2.
fn gsm7_septets(text: &str) -> u32 {
    text.chars()
        .map(|c| if GSM_EXTENDED.contains(&c) { 2 } else { 1 })
        .sum()
}

/// Segment count for a message body.
///
/// GSM-7: 160 septets single-part, 153 per part when multi-part.
/// UCS-2: 70 UTF-16 code units single-part, 67 per part when multi-part.
pub fn calculate_segments(text: &str) -> SegmentCount {
    if is_gsm7(text) {
        let septets = gsm7_septets(text);
        let segments = if septets <= 160 {
            1
        } else {
            septets.div_ceil(153)
        };
        SegmentCount {
            segments,
            encoding: SmsEncoding::Gsm7,
        }
    } else {
        let units = text.encode_utf16().count() as u32;
        let segments = if units <= 70 { 1 } else { units.div_ceil(67) };
        SegmentCount {
            segments,
            encoding: SmsEncoding::Ucs2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn contact(attrs: &[(&str, Value)]) -> Contact {
        Contact {
            id: 1,
            contact_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            phone: "+420777111222".into(),
            email: None,
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<HashMap<_, _>>(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_strict_roundtrip() {
        let c = contact(&[("name", json!("Ali"))]);
        assert_eq!(render_strict("Hello {{name}}", &c).unwrap(), "Hello Ali");
    }

    #[test]
    fn test_render_strict_reports_missing() {
        let c = contact(&[]);
        let err = render_strict("Hello {{missing}}", &c).unwrap_err();
        match err {
            EngineError::TemplateRender { unresolved } => {
                assert_eq!(unresolved, vec!["missing".to_string()]);
            }
            other => panic!("expected TemplateRender, got {other:?}"),
        }
    }

    #[test]
    fn test_render_strict_collects_all_unresolved() {
        let c = contact(&[("name", json!("Ali"))]);
        let err = render_strict("{{name}} {{a}} {{b}} {{a}}", &c).unwrap_err();
        match err {
            EngineError::TemplateRender { unresolved } => {
                assert_eq!(unresolved, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected TemplateRender, got {other:?}"),
        }
    }

    #[test]
    fn test_render_best_effort_blanks_unresolved() {
        let c = contact(&[("name", json!("Ali"))]);
        assert_eq!(render("Hi {{name}}{{x}}!", &c), "Hi Ali!");
    }

    #[test]
    fn test_render_formats_numbers_and_bools() {
        let c = contact(&[("points", json!(120)), ("vip", json!(true))]);
        assert_eq!(
            render("{{points}} points, vip={{vip}}", &c),
            "120 points, vip=true"
        );
    }

    #[test]
    fn test_render_whitespace_in_placeholder() {
        let c = contact(&[("name", json!("Ali"))]);
        assert_eq!(render_strict("Hi {{ name }}", &c).unwrap(), "Hi Ali");
    }

    #[test]
    fn test_array_value_is_unresolved() {
        let c = contact(&[("orders", json!([{"sku": "A"}]))]);
        assert!(render_strict("{{orders}}", &c).is_err());
    }

    #[test]
    fn test_placeholder_names_dedup() {
        assert_eq!(
            placeholder_names("{{a}} {{b}} {{a}}"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_gsm7_single_segment_boundary() {
        let body = "a".repeat(160);
        let count = calculate_segments(&body);
        assert_eq!(count.segments, 1);
        assert_eq!(count.encoding, SmsEncoding::Gsm7);
    }

    #[test]
    fn test_gsm7_two_segment_boundary() {
        let body = "a".repeat(161);
        let count = calculate_segments(&body);
        assert_eq!(count.segments, 2);

        // 306 = 2 * 153 still fits two parts, 307 spills into three.
        assert_eq!(calculate_segments(&"a".repeat(306)).segments, 2);
        assert_eq!(calculate_segments(&"a".repeat(307)).segments, 3);
    }

    #[test]
    fn test_gsm7_extension_chars_cost_two() {
        // 79 'a' + 1 '€' = 81 septets, still one segment;
        // 159 'a' + 1 '€' = 161 septets, two segments.
        let one = format!("{}€", "a".repeat(79));
        assert_eq!(calculate_segments(&one).segments, 1);
        let two = format!("{}€", "a".repeat(159));
        assert_eq!(calculate_segments(&two).segments, 2);
        assert_eq!(calculate_segments(&two).encoding, SmsEncoding::Gsm7);
    }

    #[test]
    fn test_unicode_segment_boundary() {
        // 69 ASCII chars + one non-GSM char = 70 UTF-16 units, one segment.
        let body = format!("{}č", "a".repeat(69));
        let count = calculate_segments(&body);
        assert_eq!(count.encoding, SmsEncoding::Ucs2);
        assert_eq!(count.segments, 1);

        // 70 + 1 = 71 units, two segments of at most 67.
        let body = format!("{}č", "a".repeat(70));
        assert_eq!(calculate_segments(&body).segments, 2);
    }

    #[test]
    fn test_empty_body_is_one_segment() {
        assert_eq!(calculate_segments("").segments, 1);
    }

    #[test]
    fn test_sanitize_maps_smart_punctuation() {
        let s = sanitize_for_sms("\u{201C}Hi\u{201D} \u{2013} it\u{2019}s fine\u{2026}");
        assert_eq!(s.text, "\"Hi\" - it's fine...");
        assert!(!s.requires_unicode);
    }

    #[test]
    fn test_sanitize_flags_remaining_unicode() {
        let s = sanitize_for_sms("Ahoj Václave");
        assert_eq!(s.text, "Ahoj Václave");
        assert!(s.requires_unicode);
    }

    #[test]
    fn test_sanitize_keeps_gsm_extension_chars() {
        let s = sanitize_for_sms("price: 10€ [net]");
        assert!(!s.requires_unicode);
    }
}
