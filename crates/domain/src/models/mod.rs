//! Domain models for the campaign engine.

pub mod attribute_schema;
pub mod attribute_value;
pub mod campaign;
pub mod contact;
pub mod cooldown;
pub mod message;
pub mod segment;

pub use attribute_schema::{AttributeDef, AttributeType};
pub use attribute_value::AttributeValue;
pub use campaign::{Campaign, CampaignChannel, CampaignStatus, CampaignType};
pub use contact::Contact;
pub use cooldown::CooldownEntry;
pub use message::{FailureReason, Message, MessageStatus};
pub use segment::{FilterCondition, FilterConfig, FilterLogic, FilterOperator, SavedSegment};
