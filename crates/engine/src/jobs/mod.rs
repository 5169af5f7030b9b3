//! Background jobs: scheduler infrastructure plus the campaign ticks.

pub mod automated_campaigns;
pub mod scheduled_campaigns;
pub mod scheduler;

pub use automated_campaigns::AutomatedCampaignJob;
pub use scheduled_campaigns::ScheduledCampaignJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
