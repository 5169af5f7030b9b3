//! Store traits consumed by the execution engine.
//!
//! Persistence technology stays behind these contracts; the engine only
//! sees them. `crates/persistence` ships both Postgres-backed and
//! in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::attribute_schema::AttributeDef;
use crate::models::campaign::{Campaign, CampaignStatus};
use crate::models::contact::{Contact, UpsertContactRequest};
use crate::models::message::{FailureReason, Message, MessageStatus, NewMessage};
use crate::models::segment::SavedSegment;
use crate::services::segmentation::CompiledFilter;
use shared::pagination::{Paged, PageParams};

/// Per-client attribute schema declarations.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Replace the client's whole schema (delete-all-then-recreate).
    async fn replace_for_client(
        &self,
        client_id: Uuid,
        defs: Vec<AttributeDef>,
    ) -> Result<(), EngineError>;

    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<AttributeDef>, EngineError>;
}

/// Contact storage and predicate-driven querying.
///
/// `query` and `count` evaluate the same compiled predicate; `query`
/// orders by contact creation (`id ASC`) so limited previews are
/// deterministic prefixes.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn upsert(
        &self,
        client_id: Uuid,
        request: UpsertContactRequest,
    ) -> Result<Contact, EngineError>;

    async fn find_by_client_and_phone(
        &self,
        client_id: Uuid,
        phone: &str,
    ) -> Result<Option<Contact>, EngineError>;

    async fn find_by_contact_id(&self, contact_id: Uuid) -> Result<Option<Contact>, EngineError>;

    async fn query(
        &self,
        client_id: Uuid,
        filter: &CompiledFilter,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Contact>, EngineError>;

    async fn count(&self, client_id: Uuid, filter: &CompiledFilter) -> Result<u64, EngineError>;

    async fn delete(&self, client_id: Uuid, contact_id: Uuid) -> Result<bool, EngineError>;

    async fn delete_bulk(&self, client_id: Uuid, contact_ids: &[Uuid]) -> Result<u64, EngineError>;
}

/// Saved segment CRUD.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    async fn create(&self, segment: SavedSegment) -> Result<SavedSegment, EngineError>;
    async fn update(&self, segment: &SavedSegment) -> Result<(), EngineError>;
    async fn find(&self, segment_id: Uuid) -> Result<Option<SavedSegment>, EngineError>;
    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<SavedSegment>, EngineError>;
    async fn delete(&self, segment_id: Uuid) -> Result<bool, EngineError>;
}

/// Campaign storage, including the atomic pieces the dispatch pipeline
/// depends on: counter increments and race-safe status moves.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn create(&self, campaign: Campaign) -> Result<Campaign, EngineError>;

    /// Full-row update of mutable fields (draft/paused edits).
    async fn update(&self, campaign: &Campaign) -> Result<(), EngineError>;

    async fn find(&self, campaign_id: Uuid) -> Result<Option<Campaign>, EngineError>;

    async fn list_for_client(
        &self,
        client_id: Uuid,
        params: PageParams,
    ) -> Result<Paged<Campaign>, EngineError>;

    async fn delete(&self, campaign_id: Uuid) -> Result<bool, EngineError>;

    async fn set_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> Result<(), EngineError>;

    /// Set `status` only when the current status is one of `from`.
    /// Returns false when the guard lost the race.
    async fn compare_and_set_status(
        &self,
        campaign_id: Uuid,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<bool, EngineError>;

    /// Atomic `sent_count += 1`, `total_cost += cost` (email mirrors when
    /// `email` is set).
    async fn increment_sent(
        &self,
        campaign_id: Uuid,
        cost: f64,
        email: bool,
    ) -> Result<(), EngineError>;

    async fn increment_failed(&self, campaign_id: Uuid, email: bool) -> Result<(), EngineError>;

    async fn increment_delivered(&self, campaign_id: Uuid) -> Result<(), EngineError>;

    async fn set_next_run(
        &self,
        campaign_id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), EngineError>;

    /// Active automated campaigns with `next_run_at <= now`. Claiming is
    /// atomic: the returned campaigns have had `next_run_at` cleared so a
    /// concurrent tick cannot pick them up again.
    async fn claim_due_automated(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, EngineError>;

    /// Scheduled one-time campaigns whose `scheduled_at` has passed,
    /// atomically moved to `sending`.
    async fn claim_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, EngineError>;
}

/// Delivery record storage.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn record(&self, message: NewMessage) -> Result<Message, EngineError>;

    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
        error_message: Option<String>,
        failure_reason: Option<FailureReason>,
    ) -> Result<(), EngineError>;

    async fn find_by_provider_tx(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<Message>, EngineError>;

    /// Cursor-paginated history, newest first. The cursor is
    /// `(created_at, id)` of the last row of the previous page.
    async fn list_for_campaign(
        &self,
        campaign_id: Uuid,
        cursor: Option<(DateTime<Utc>, i64)>,
        limit: u64,
    ) -> Result<Vec<Message>, EngineError>;

    async fn failed_for_campaign(&self, campaign_id: Uuid) -> Result<Vec<Message>, EngineError>;
}

/// Append-only cooldown log.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// Append an entry unless one inside the window already exists.
    /// Returns true when the entry was appended. This is the race-safe
    /// check-then-act primitive the de-duplication contract rests on.
    /// `window = None` means any existing entry blocks.
    async fn record_if_absent(
        &self,
        campaign_id: Uuid,
        contact_id: Uuid,
        window: Option<Duration>,
    ) -> Result<bool, EngineError>;

    /// Remove the most recent entry for the pair. Dispatch reserves the
    /// cooldown slot before calling the provider and releases it when the
    /// provider fails, so failed sends never block a retry.
    async fn release(&self, campaign_id: Uuid, contact_id: Uuid) -> Result<(), EngineError>;

    async fn in_cooldown(
        &self,
        campaign_id: Uuid,
        contact_id: Uuid,
        window: Option<Duration>,
    ) -> Result<bool, EngineError>;

    /// Contacts currently in cooldown for a campaign; used to exclude
    /// already-served contacts from planned counts.
    async fn contacts_in_cooldown(
        &self,
        campaign_id: Uuid,
        window: Option<Duration>,
    ) -> Result<HashSet<Uuid>, EngineError>;
}

/// Prepaid owner account.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn balance(&self, client_id: Uuid) -> Result<f64, EngineError>;

    /// Atomic conditional decrement: deducts and returns true only when
    /// the balance covers `amount`. Never drives the balance negative.
    async fn try_deduct(&self, client_id: Uuid, amount: f64) -> Result<bool, EngineError>;

    async fn add(&self, client_id: Uuid, amount: f64) -> Result<(), EngineError>;

    /// Sender ids the client may use. An empty list permits any sender.
    async fn allowed_senders(&self, client_id: Uuid) -> Result<Vec<String>, EngineError>;
}
