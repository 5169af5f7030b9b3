//! Postgres repository implementations of the domain store traits.

pub mod account;
pub mod attribute_schema;
pub mod campaign;
pub mod contact;
pub mod cooldown;
pub mod message;
pub mod saved_segment;

pub use account::PgAccountStore;
pub use attribute_schema::PgSchemaStore;
pub use campaign::PgCampaignStore;
pub use contact::PgContactStore;
pub use cooldown::PgCooldownStore;
pub use message::PgMessageStore;
pub use saved_segment::PgSegmentStore;
