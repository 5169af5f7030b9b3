//! Cooldown log entries.
//!
//! Append-only per-(campaign, contact) send records. A contact is in
//! cooldown for a campaign iff an entry exists with
//! `sent_at >= now - cooldown_days`; the log both skips duplicate sends
//! and excludes already-served contacts from planned counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CooldownEntry {
    pub id: i64,
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

impl CooldownEntry {
    /// Whether this entry still blocks a send at `now` for the given window.
    /// `window = None` blocks forever (one-time campaigns).
    pub fn blocks(&self, now: DateTime<Utc>, window: Option<chrono::Duration>) -> bool {
        match window {
            Some(w) => self.sent_at >= now - w,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_blocks_inside_window() {
        let entry = CooldownEntry {
            id: 1,
            campaign_id: Uuid::new_v4(),
            contact_id: Uuid::new_v4(),
            sent_at: Utc::now() - Duration::days(3),
        };
        assert!(entry.blocks(Utc::now(), Some(Duration::days(7))));
        assert!(!entry.blocks(Utc::now(), Some(Duration::days(2))));
        assert!(entry.blocks(Utc::now(), None));
    }
}
