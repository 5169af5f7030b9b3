//! Campaign entity and its status state machine.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::EngineError;
use crate::models::segment::FilterConfig;

/// One-shot or recurring delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    OneTime,
    Automated,
}

/// Delivery channel. `Both` keeps per-channel counters; orchestration
/// beyond that is out of scope and dispatch sends SMS only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignChannel {
    Sms,
    Email,
    Both,
}

impl CampaignChannel {
    pub fn uses_sms(&self) -> bool {
        matches!(self, CampaignChannel::Sms | CampaignChannel::Both)
    }

    pub fn uses_email(&self) -> bool {
        matches!(self, CampaignChannel::Email | CampaignChannel::Both)
    }

    /// Rate-limiter gate name for this channel.
    pub fn limiter_name(&self) -> &'static str {
        match self {
            CampaignChannel::Sms | CampaignChannel::Both => "sms",
            CampaignChannel::Email => "email",
        }
    }
}

impl std::fmt::Display for CampaignChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CampaignChannel::Sms => "sms",
            CampaignChannel::Email => "email",
            CampaignChannel::Both => "both",
        };
        write!(f, "{s}")
    }
}

/// Campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A messaging campaign owned by one client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Campaign {
    pub id: i64,
    pub campaign_id: Uuid,
    pub client_id: Uuid,
    pub name: String,
    pub campaign_type: CampaignType,
    pub channel: CampaignChannel,
    pub status: CampaignStatus,
    pub segment_filter: FilterConfig,
    pub message_template: Option<String>,
    pub email_subject_template: Option<String>,
    pub email_body_template: Option<String>,
    pub sender: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Cached snapshot of the segment size, recomputed on filter change.
    pub target_count: i64,
    pub sent_count: i64,
    pub delivered_count: i64,
    pub failed_count: i64,
    pub total_cost: f64,
    pub email_sent_count: i64,
    pub email_failed_count: i64,
    pub email_total_cost: f64,
    // Automated-only schedule fields.
    pub check_interval_minutes: Option<i32>,
    pub cooldown_days: Option<i32>,
    pub run_start_hour: Option<i16>,
    pub run_end_hour: Option<i16>,
    pub ends_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub is_test: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn is_automated(&self) -> bool {
        self.campaign_type == CampaignType::Automated
    }

    /// Only draft and paused campaigns are mutable.
    pub fn can_update(&self) -> bool {
        matches!(self.status, CampaignStatus::Draft | CampaignStatus::Paused)
    }

    /// Only draft and cancelled campaigns are deletable.
    pub fn can_delete(&self) -> bool {
        matches!(self.status, CampaignStatus::Draft | CampaignStatus::Cancelled)
    }

    /// Only scheduled campaigns are cancellable.
    pub fn can_cancel(&self) -> bool {
        self.status == CampaignStatus::Scheduled
    }

    /// Only draft/paused automated campaigns can be activated.
    pub fn can_activate(&self) -> bool {
        self.is_automated() && matches!(self.status, CampaignStatus::Draft | CampaignStatus::Paused)
    }

    /// Only active automated campaigns can be paused by an operator.
    pub fn can_pause(&self) -> bool {
        self.is_automated() && self.status == CampaignStatus::Active
    }

    /// One-time campaigns can be executed from draft or scheduled.
    pub fn can_execute(&self) -> bool {
        self.campaign_type == CampaignType::OneTime
            && matches!(self.status, CampaignStatus::Draft | CampaignStatus::Scheduled)
    }

    /// Whether dispatch may start a new unit for this campaign.
    pub fn accepts_dispatch(&self) -> bool {
        matches!(self.status, CampaignStatus::Active | CampaignStatus::Sending)
    }

    /// Guard helper producing a `StateConflict` with a uniform message.
    pub fn guard(&self, allowed: bool, operation: &str) -> Result<(), EngineError> {
        if allowed {
            Ok(())
        } else {
            Err(EngineError::StateConflict(format!(
                "Cannot {operation} campaign in status {}",
                self.status
            )))
        }
    }

    /// Cooldown window for this campaign. `None` means any prior send to
    /// a contact excludes them permanently (one-time campaigns).
    pub fn cooldown_window(&self) -> Option<Duration> {
        self.cooldown_days.map(|d| Duration::days(i64::from(d)))
    }

    /// Whether `now` falls inside the configured run-hour window.
    /// No window configured means any hour is allowed.
    pub fn in_run_window(&self, now: DateTime<Utc>) -> bool {
        match (self.run_start_hour, self.run_end_hour) {
            (Some(start), Some(end)) => {
                let hour = now.hour() as i16;
                hour >= start && hour < end
            }
            _ => true,
        }
    }

    /// Next run timestamp for an automated campaign.
    ///
    /// The result is at least `now + check_interval_minutes`, advanced to
    /// the run window's start (same or next day) when it falls outside the
    /// window, and never past `ends_at` (`None` means the campaign is done).
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let interval = Duration::minutes(i64::from(self.check_interval_minutes?));
        let mut next = now + interval;

        if let (Some(start), Some(end)) = (self.run_start_hour, self.run_end_hour) {
            let hour = next.hour() as i16;
            if hour < start {
                next = at_hour(next, start as u32);
            } else if hour >= end {
                next = at_hour(next + Duration::days(1), start as u32);
            }
        }

        match self.ends_at {
            Some(ends_at) if next > ends_at => None,
            _ => Some(next),
        }
    }

    /// Copy template, filter and schedule settings into a fresh draft
    /// with zeroed counters.
    pub fn duplicate(&self, name: String, now: DateTime<Utc>) -> Campaign {
        Campaign {
            id: 0,
            campaign_id: Uuid::new_v4(),
            client_id: self.client_id,
            name,
            campaign_type: self.campaign_type,
            channel: self.channel,
            status: CampaignStatus::Draft,
            segment_filter: self.segment_filter.clone(),
            message_template: self.message_template.clone(),
            email_subject_template: self.email_subject_template.clone(),
            email_body_template: self.email_body_template.clone(),
            sender: self.sender.clone(),
            scheduled_at: None,
            target_count: self.target_count,
            sent_count: 0,
            delivered_count: 0,
            failed_count: 0,
            total_cost: 0.0,
            email_sent_count: 0,
            email_failed_count: 0,
            email_total_cost: 0.0,
            check_interval_minutes: self.check_interval_minutes,
            cooldown_days: self.cooldown_days,
            run_start_hour: self.run_start_hour,
            run_end_hour: self.run_end_hour,
            ends_at: self.ends_at,
            next_run_at: None,
            is_test: self.is_test,
            created_at: now,
            updated_at: now,
        }
    }
}

fn at_hour(day: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(
        day.date_naive().year(),
        day.date_naive().month(),
        day.date_naive().day(),
        hour,
        0,
        0,
    )
    .single()
    .unwrap_or(day)
}

/// Request payload for creating a campaign (created in `draft`).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: String,

    pub campaign_type: CampaignType,
    pub channel: CampaignChannel,
    pub segment_filter: FilterConfig,

    #[validate(custom(function = "shared::validation::validate_template_length"))]
    pub message_template: Option<String>,

    #[validate(length(max = 255, message = "Subject must be at most 255 characters"))]
    pub email_subject_template: Option<String>,

    #[validate(custom(function = "shared::validation::validate_template_length"))]
    pub email_body_template: Option<String>,

    #[validate(custom(function = "shared::validation::validate_sender"))]
    pub sender: String,

    pub scheduled_at: Option<DateTime<Utc>>,

    #[validate(range(min = 1, message = "Check interval must be at least 1 minute"))]
    pub check_interval_minutes: Option<i32>,

    #[validate(range(min = 0, message = "Cooldown days must be non-negative"))]
    pub cooldown_days: Option<i32>,

    pub run_start_hour: Option<i16>,

    // Window end is exclusive, so 24 closes the day.
    #[validate(range(min = 1, max = 24, message = "Run end hour must be 1-24"))]
    pub run_end_hour: Option<i16>,

    pub ends_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_test: bool,
}

impl CreateCampaignRequest {
    /// Cross-field checks the derive cannot express: channel/template
    /// pairing, run-window ordering, automated schedule completeness.
    pub fn validate_shape(&self) -> Result<(), EngineError> {
        use crate::error::ValidationDetail;

        let mut details = Vec::new();

        if let Some(start) = self.run_start_hour {
            if shared::validation::validate_hour_of_day(start).is_err() {
                details.push(ValidationDetail::new(
                    "run_start_hour",
                    "Run window start must be an hour of day (0-23)",
                ));
            }
        }
        if self.channel.uses_sms() && self.message_template.as_deref().unwrap_or("").is_empty() {
            details.push(ValidationDetail::new(
                "message_template",
                "SMS campaigns require a message template",
            ));
        }
        if self.channel.uses_email() {
            if self.email_subject_template.as_deref().unwrap_or("").is_empty() {
                details.push(ValidationDetail::new(
                    "email_subject_template",
                    "Email campaigns require a subject template",
                ));
            }
            if self.email_body_template.as_deref().unwrap_or("").is_empty() {
                details.push(ValidationDetail::new(
                    "email_body_template",
                    "Email campaigns require a body template",
                ));
            }
        }
        if let (Some(start), Some(end)) = (self.run_start_hour, self.run_end_hour) {
            if start >= end {
                details.push(ValidationDetail::new(
                    "run_start_hour",
                    "Run window start must be before its end",
                ));
            }
        }
        if self.run_start_hour.is_some() != self.run_end_hour.is_some() {
            details.push(ValidationDetail::new(
                "run_end_hour",
                "Run window requires both a start and an end hour",
            ));
        }
        if self.campaign_type == CampaignType::Automated && self.check_interval_minutes.is_none() {
            details.push(ValidationDetail::new(
                "check_interval_minutes",
                "Automated campaigns require a check interval",
            ));
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(details))
        }
    }
}

/// Request payload for updating a campaign (draft/paused only).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateCampaignRequest {
    #[validate(length(min = 1, max = 150, message = "Name must be 1-150 characters"))]
    pub name: Option<String>,

    pub segment_filter: Option<FilterConfig>,

    #[validate(custom(function = "shared::validation::validate_template_length"))]
    pub message_template: Option<String>,

    #[validate(length(max = 255, message = "Subject must be at most 255 characters"))]
    pub email_subject_template: Option<String>,

    #[validate(custom(function = "shared::validation::validate_template_length"))]
    pub email_body_template: Option<String>,

    #[validate(custom(function = "shared::validation::validate_sender"))]
    pub sender: Option<String>,

    pub scheduled_at: Option<DateTime<Utc>>,

    #[validate(range(min = 1, message = "Check interval must be at least 1 minute"))]
    pub check_interval_minutes: Option<i32>,

    #[validate(range(min = 0, message = "Cooldown days must be non-negative"))]
    pub cooldown_days: Option<i32>,

    pub run_start_hour: Option<i16>,

    #[validate(range(min = 1, max = 24, message = "Run end hour must be 1-24"))]
    pub run_end_hour: Option<i16>,

    pub ends_at: Option<DateTime<Utc>>,
}

impl UpdateCampaignRequest {
    /// Cross-field checks shared with creation; callers merge the patch
    /// into the stored campaign before re-checking window ordering.
    pub fn validate_shape(&self) -> Result<(), EngineError> {
        use crate::error::ValidationDetail;

        let mut details = Vec::new();
        if let Some(start) = self.run_start_hour {
            if shared::validation::validate_hour_of_day(start).is_err() {
                details.push(ValidationDetail::new(
                    "run_start_hour",
                    "Run window start must be an hour of day (0-23)",
                ));
            }
        }

        if details.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(details))
        }
    }
}
