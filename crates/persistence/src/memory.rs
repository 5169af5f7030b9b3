//! In-memory store implementations.
//!
//! Functionally equivalent to the Postgres repositories, used by the
//! engine's tests and by embedders that do not want a database. The
//! atomicity contracts (conditional balance deduction, cooldown
//! check-then-act, status compare-and-set) hold under a mutex instead
//! of a row lock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::contact::UpsertContactRequest;
use domain::models::message::NewMessage;
use domain::models::{
    AttributeDef, Campaign, CampaignStatus, Contact, CooldownEntry, FailureReason, Message,
    MessageStatus, SavedSegment,
};
use domain::services::segmentation::CompiledFilter;
use domain::stores::{
    AccountStore, CampaignStore, ContactStore, CooldownStore, MessageStore, SchemaStore,
    SegmentStore,
};
use shared::pagination::{Paged, PageParams};

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::SeqCst)
}

/// In-memory attribute schema store.
#[derive(Default)]
pub struct InMemorySchemaStore {
    schemas: Mutex<HashMap<Uuid, Vec<AttributeDef>>>,
}

#[async_trait]
impl SchemaStore for InMemorySchemaStore {
    async fn replace_for_client(
        &self,
        client_id: Uuid,
        defs: Vec<AttributeDef>,
    ) -> Result<(), EngineError> {
        self.schemas.lock().unwrap().insert(client_id, defs);
        Ok(())
    }

    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<AttributeDef>, EngineError> {
        Ok(self
            .schemas
            .lock()
            .unwrap()
            .get(&client_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory contact store with stable insertion ordering.
#[derive(Default)]
pub struct InMemoryContactStore {
    contacts: Mutex<Vec<Contact>>,
    next_id: AtomicI64,
}

impl InMemoryContactStore {
    fn sorted_matches(&self, client_id: Uuid, filter: &CompiledFilter) -> Vec<Contact> {
        let contacts = self.contacts.lock().unwrap();
        let mut matches: Vec<Contact> = contacts
            .iter()
            .filter(|c| c.client_id == client_id && filter.matches(c))
            .cloned()
            .collect();
        matches.sort_by_key(|c| c.id);
        matches
    }
}

#[async_trait]
impl ContactStore for InMemoryContactStore {
    async fn upsert(
        &self,
        client_id: Uuid,
        request: UpsertContactRequest,
    ) -> Result<Contact, EngineError> {
        let mut contacts = self.contacts.lock().unwrap();
        let now = Utc::now();
        if let Some(existing) = contacts
            .iter_mut()
            .find(|c| c.client_id == client_id && c.phone == request.phone)
        {
            existing.email = request.email;
            existing.attributes = request.attributes;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let contact = Contact {
            id: next_id(&self.next_id),
            contact_id: Uuid::new_v4(),
            client_id,
            phone: request.phone,
            email: request.email,
            attributes: request.attributes,
            created_at: now,
            updated_at: now,
        };
        contacts.push(contact.clone());
        Ok(contact)
    }

    async fn find_by_client_and_phone(
        &self,
        client_id: Uuid,
        phone: &str,
    ) -> Result<Option<Contact>, EngineError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.client_id == client_id && c.phone == phone)
            .cloned())
    }

    async fn find_by_contact_id(&self, contact_id: Uuid) -> Result<Option<Contact>, EngineError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.contact_id == contact_id)
            .cloned())
    }

    async fn query(
        &self,
        client_id: Uuid,
        filter: &CompiledFilter,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Contact>, EngineError> {
        let iter = self
            .sorted_matches(client_id, filter)
            .into_iter()
            .skip(offset as usize);
        Ok(match limit {
            Some(n) => iter.take(n as usize).collect(),
            None => iter.collect(),
        })
    }

    async fn count(&self, client_id: Uuid, filter: &CompiledFilter) -> Result<u64, EngineError> {
        Ok(self.sorted_matches(client_id, filter).len() as u64)
    }

    async fn delete(&self, client_id: Uuid, contact_id: Uuid) -> Result<bool, EngineError> {
        let mut contacts = self.contacts.lock().unwrap();
        let before = contacts.len();
        contacts.retain(|c| !(c.client_id == client_id && c.contact_id == contact_id));
        Ok(contacts.len() < before)
    }

    async fn delete_bulk(&self, client_id: Uuid, contact_ids: &[Uuid]) -> Result<u64, EngineError> {
        let mut contacts = self.contacts.lock().unwrap();
        let before = contacts.len();
        contacts.retain(|c| !(c.client_id == client_id && contact_ids.contains(&c.contact_id)));
        Ok((before - contacts.len()) as u64)
    }
}

/// In-memory saved segment store.
#[derive(Default)]
pub struct InMemorySegmentStore {
    segments: Mutex<Vec<SavedSegment>>,
    next_id: AtomicI64,
}

#[async_trait]
impl SegmentStore for InMemorySegmentStore {
    async fn create(&self, mut segment: SavedSegment) -> Result<SavedSegment, EngineError> {
        segment.id = next_id(&self.next_id);
        self.segments.lock().unwrap().push(segment.clone());
        Ok(segment)
    }

    async fn update(&self, segment: &SavedSegment) -> Result<(), EngineError> {
        let mut segments = self.segments.lock().unwrap();
        match segments
            .iter_mut()
            .find(|s| s.segment_id == segment.segment_id)
        {
            Some(existing) => {
                *existing = segment.clone();
                Ok(())
            }
            None => Err(EngineError::NotFound(format!(
                "Segment {}",
                segment.segment_id
            ))),
        }
    }

    async fn find(&self, segment_id: Uuid) -> Result<Option<SavedSegment>, EngineError> {
        Ok(self
            .segments
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.segment_id == segment_id)
            .cloned())
    }

    async fn list_for_client(&self, client_id: Uuid) -> Result<Vec<SavedSegment>, EngineError> {
        Ok(self
            .segments
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, segment_id: Uuid) -> Result<bool, EngineError> {
        let mut segments = self.segments.lock().unwrap();
        let before = segments.len();
        segments.retain(|s| s.segment_id != segment_id);
        Ok(segments.len() < before)
    }
}

/// In-memory campaign store with atomic counter and status semantics.
#[derive(Default)]
pub struct InMemoryCampaignStore {
    campaigns: Mutex<Vec<Campaign>>,
    next_id: AtomicI64,
}

impl InMemoryCampaignStore {
    fn with_campaign<T>(
        &self,
        campaign_id: Uuid,
        f: impl FnOnce(&mut Campaign) -> T,
    ) -> Result<T, EngineError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        match campaigns.iter_mut().find(|c| c.campaign_id == campaign_id) {
            Some(campaign) => Ok(f(campaign)),
            None => Err(EngineError::NotFound(format!("Campaign {campaign_id}"))),
        }
    }
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn create(&self, mut campaign: Campaign) -> Result<Campaign, EngineError> {
        campaign.id = next_id(&self.next_id);
        self.campaigns.lock().unwrap().push(campaign.clone());
        Ok(campaign)
    }

    async fn update(&self, campaign: &Campaign) -> Result<(), EngineError> {
        self.with_campaign(campaign.campaign_id, |existing| {
            *existing = campaign.clone();
        })
    }

    async fn find(&self, campaign_id: Uuid) -> Result<Option<Campaign>, EngineError> {
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.campaign_id == campaign_id)
            .cloned())
    }

    async fn list_for_client(
        &self,
        client_id: Uuid,
        params: PageParams,
    ) -> Result<Paged<Campaign>, EngineError> {
        let campaigns = self.campaigns.lock().unwrap();
        let mut matching: Vec<Campaign> = campaigns
            .iter()
            .filter(|c| c.client_id == client_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .collect();
        Ok(Paged::new(items, total, params))
    }

    async fn delete(&self, campaign_id: Uuid) -> Result<bool, EngineError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let before = campaigns.len();
        campaigns.retain(|c| c.campaign_id != campaign_id);
        Ok(campaigns.len() < before)
    }

    async fn set_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> Result<(), EngineError> {
        self.with_campaign(campaign_id, |c| {
            c.status = status;
            c.updated_at = Utc::now();
        })
    }

    async fn compare_and_set_status(
        &self,
        campaign_id: Uuid,
        from: &[CampaignStatus],
        to: CampaignStatus,
    ) -> Result<bool, EngineError> {
        self.with_campaign(campaign_id, |c| {
            if from.contains(&c.status) {
                c.status = to;
                c.updated_at = Utc::now();
                true
            } else {
                false
            }
        })
    }

    async fn increment_sent(
        &self,
        campaign_id: Uuid,
        cost: f64,
        email: bool,
    ) -> Result<(), EngineError> {
        self.with_campaign(campaign_id, |c| {
            c.sent_count += 1;
            c.total_cost += cost;
            if email {
                c.email_sent_count += 1;
                c.email_total_cost += cost;
            }
        })
    }

    async fn increment_failed(&self, campaign_id: Uuid, email: bool) -> Result<(), EngineError> {
        self.with_campaign(campaign_id, |c| {
            c.failed_count += 1;
            if email {
                c.email_failed_count += 1;
            }
        })
    }

    async fn increment_delivered(&self, campaign_id: Uuid) -> Result<(), EngineError> {
        self.with_campaign(campaign_id, |c| {
            c.delivered_count += 1;
        })
    }

    async fn set_next_run(
        &self,
        campaign_id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), EngineError> {
        self.with_campaign(campaign_id, |c| {
            c.next_run_at = next_run_at;
        })
    }

    async fn claim_due_automated(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, EngineError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let mut due = Vec::new();
        for campaign in campaigns.iter_mut() {
            if campaign.is_automated()
                && campaign.status == CampaignStatus::Active
                && campaign.next_run_at.is_some_and(|t| t <= now)
            {
                campaign.next_run_at = None;
                due.push(campaign.clone());
            }
        }
        Ok(due)
    }

    async fn claim_due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, EngineError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let mut due = Vec::new();
        for campaign in campaigns.iter_mut() {
            if !campaign.is_automated()
                && campaign.status == CampaignStatus::Scheduled
                && campaign.scheduled_at.is_some_and(|t| t <= now)
            {
                campaign.status = CampaignStatus::Sending;
                due.push(campaign.clone());
            }
        }
        Ok(due)
    }
}

/// In-memory message store.
#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<Message>>,
    next_id: AtomicI64,
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn record(&self, message: NewMessage) -> Result<Message, EngineError> {
        let now = Utc::now();
        let stored = Message {
            id: next_id(&self.next_id),
            message_id: Uuid::new_v4(),
            campaign_id: message.campaign_id,
            contact_id: message.contact_id,
            client_id: message.client_id,
            channel: message.channel,
            destination: message.destination,
            body: message.body,
            status: message.status,
            segments: message.segments,
            cost: message.cost,
            provider_transaction_id: message.provider_transaction_id,
            error_message: message.error_message,
            failure_reason: message.failure_reason,
            is_test: message.is_test,
            created_at: now,
            updated_at: now,
        };
        self.messages.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn update_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
        error_message: Option<String>,
        failure_reason: Option<FailureReason>,
    ) -> Result<(), EngineError> {
        let mut messages = self.messages.lock().unwrap();
        match messages.iter_mut().find(|m| m.message_id == message_id) {
            Some(message) => {
                message.status = status;
                if error_message.is_some() {
                    message.error_message = error_message;
                }
                if failure_reason.is_some() {
                    message.failure_reason = failure_reason;
                }
                message.updated_at = Utc::now();
                Ok(())
            }
            None => Err(EngineError::NotFound(format!("Message {message_id}"))),
        }
    }

    async fn find_by_provider_tx(
        &self,
        provider_transaction_id: &str,
    ) -> Result<Option<Message>, EngineError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.provider_transaction_id.as_deref() == Some(provider_transaction_id))
            .cloned())
    }

    async fn list_for_campaign(
        &self,
        campaign_id: Uuid,
        cursor: Option<(DateTime<Utc>, i64)>,
        limit: u64,
    ) -> Result<Vec<Message>, EngineError> {
        let messages = self.messages.lock().unwrap();
        let mut matching: Vec<Message> = messages
            .iter()
            .filter(|m| m.campaign_id == campaign_id)
            .filter(|m| match cursor {
                Some((created_at, id)) => (m.created_at, m.id) < (created_at, id),
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn failed_for_campaign(&self, campaign_id: Uuid) -> Result<Vec<Message>, EngineError> {
        let messages = self.messages.lock().unwrap();
        let mut failed: Vec<Message> = messages
            .iter()
            .filter(|m| m.campaign_id == campaign_id && m.status == MessageStatus::Failed)
            .cloned()
            .collect();
        failed.sort_by_key(|m| m.id);
        Ok(failed)
    }
}

/// In-memory cooldown log.
#[derive(Default)]
pub struct InMemoryCooldownStore {
    entries: Mutex<Vec<CooldownEntry>>,
    next_id: AtomicI64,
}

#[async_trait]
impl CooldownStore for InMemoryCooldownStore {
    async fn record_if_absent(
        &self,
        campaign_id: Uuid,
        contact_id: Uuid,
        window: Option<Duration>,
    ) -> Result<bool, EngineError> {
        let now = Utc::now();
        // Check and append under one lock: the de-duplication contract.
        let mut entries = self.entries.lock().unwrap();
        let blocked = entries.iter().any(|e| {
            e.campaign_id == campaign_id && e.contact_id == contact_id && e.blocks(now, window)
        });
        if blocked {
            return Ok(false);
        }
        entries.push(CooldownEntry {
            id: next_id(&self.next_id),
            campaign_id,
            contact_id,
            sent_at: now,
        });
        Ok(true)
    }

    async fn release(&self, campaign_id: Uuid, contact_id: Uuid) -> Result<(), EngineError> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(pos) = entries
            .iter()
            .rposition(|e| e.campaign_id == campaign_id && e.contact_id == contact_id)
        {
            entries.remove(pos);
        }
        Ok(())
    }

    async fn in_cooldown(
        &self,
        campaign_id: Uuid,
        contact_id: Uuid,
        window: Option<Duration>,
    ) -> Result<bool, EngineError> {
        let now = Utc::now();
        Ok(self.entries.lock().unwrap().iter().any(|e| {
            e.campaign_id == campaign_id && e.contact_id == contact_id && e.blocks(now, window)
        }))
    }

    async fn contacts_in_cooldown(
        &self,
        campaign_id: Uuid,
        window: Option<Duration>,
    ) -> Result<HashSet<Uuid>, EngineError> {
        let now = Utc::now();
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.campaign_id == campaign_id && e.blocks(now, window))
            .map(|e| e.contact_id)
            .collect())
    }
}

/// In-memory prepaid account store.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, (f64, Vec<String>)>>,
}

impl InMemoryAccountStore {
    /// Seed an account with a balance and an allowed-sender list.
    pub fn with_account(client_id: Uuid, balance: f64, senders: Vec<String>) -> Self {
        let store = Self::default();
        store
            .accounts
            .lock()
            .unwrap()
            .insert(client_id, (balance, senders));
        store
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn balance(&self, client_id: Uuid) -> Result<f64, EngineError> {
        self.accounts
            .lock()
            .unwrap()
            .get(&client_id)
            .map(|(balance, _)| *balance)
            .ok_or_else(|| EngineError::NotFound(format!("Account for client {client_id}")))
    }

    async fn try_deduct(&self, client_id: Uuid, amount: f64) -> Result<bool, EngineError> {
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.get_mut(&client_id) {
            Some((balance, _)) if *balance >= amount => {
                *balance -= amount;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(EngineError::NotFound(format!(
                "Account for client {client_id}"
            ))),
        }
    }

    async fn add(&self, client_id: Uuid, amount: f64) -> Result<(), EngineError> {
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.get_mut(&client_id) {
            Some((balance, _)) => {
                *balance += amount;
                Ok(())
            }
            None => Err(EngineError::NotFound(format!(
                "Account for client {client_id}"
            ))),
        }
    }

    async fn allowed_senders(&self, client_id: Uuid) -> Result<Vec<String>, EngineError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(&client_id)
            .map(|(_, senders)| senders.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::segment::FilterConfig;
    use serde_json::json;
    use std::collections::HashMap as StdHashMap;

    fn upsert(phone: &str, attrs: &[(&str, serde_json::Value)]) -> UpsertContactRequest {
        UpsertContactRequest {
            phone: phone.into(),
            email: None,
            attributes: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<StdHashMap<_, _>>(),
        }
    }

    #[tokio::test]
    async fn test_contact_upsert_by_client_and_phone() {
        let store = InMemoryContactStore::default();
        let client = Uuid::new_v4();

        let first = store
            .upsert(client, upsert("+420777111222", &[("name", json!("Ali"))]))
            .await
            .unwrap();
        let second = store
            .upsert(client, upsert("+420777111222", &[("name", json!("Alice"))]))
            .await
            .unwrap();

        assert_eq!(first.contact_id, second.contact_id);
        assert_eq!(second.attributes["name"], json!("Alice"));

        let filter = CompiledFilter::compile(&[], &FilterConfig::match_all()).unwrap();
        assert_eq!(store.count(client, &filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_is_prefix_stable() {
        let store = InMemoryContactStore::default();
        let client = Uuid::new_v4();
        for i in 0..5 {
            store
                .upsert(client, upsert(&format!("+42077711122{i}"), &[]))
                .await
                .unwrap();
        }
        let filter = CompiledFilter::compile(&[], &FilterConfig::match_all()).unwrap();

        let three = store.query(client, &filter, Some(3), 0).await.unwrap();
        let four = store.query(client, &filter, Some(4), 0).await.unwrap();
        assert_eq!(
            three.iter().map(|c| c.id).collect::<Vec<_>>(),
            four.iter().take(3).map(|c| c.id).collect::<Vec<_>>()
        );

        let all = store.query(client, &filter, None, 0).await.unwrap();
        assert_eq!(all.len() as u64, store.count(client, &filter).await.unwrap());
    }

    #[tokio::test]
    async fn test_cooldown_record_if_absent_blocks_second() {
        let store = InMemoryCooldownStore::default();
        let campaign = Uuid::new_v4();
        let contact = Uuid::new_v4();
        let window = Some(Duration::days(7));

        assert!(store
            .record_if_absent(campaign, contact, window)
            .await
            .unwrap());
        assert!(!store
            .record_if_absent(campaign, contact, window)
            .await
            .unwrap());
        assert!(store.in_cooldown(campaign, contact, window).await.unwrap());

        // Exactly one entry made it into the log.
        assert_eq!(
            store
                .contacts_in_cooldown(campaign, window)
                .await
                .unwrap()
                .len(),
            1
        );

        // Releasing the reservation reopens the slot.
        store.release(campaign, contact).await.unwrap();
        assert!(store
            .record_if_absent(campaign, contact, window)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_cooldown_concurrent_reservations_admit_one() {
        let store = std::sync::Arc::new(InMemoryCooldownStore::default());
        let campaign = Uuid::new_v4();
        let contact = Uuid::new_v4();
        let window = Some(Duration::days(7));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.record_if_absent(campaign, contact, window).await
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(
            store
                .contacts_in_cooldown(campaign, window)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_account_try_deduct_floor() {
        let client = Uuid::new_v4();
        let store = InMemoryAccountStore::with_account(client, 0.10, vec![]);

        assert!(store.try_deduct(client, 0.04).await.unwrap());
        assert!(store.try_deduct(client, 0.04).await.unwrap());
        assert!(!store.try_deduct(client, 0.04).await.unwrap());

        let balance = store.balance(client).await.unwrap();
        assert!((balance - 0.02).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_campaign_cas_status() {
        let store = InMemoryCampaignStore::default();
        let campaign = sample_campaign(CampaignStatus::Active);
        let id = campaign.campaign_id;
        store.create(campaign).await.unwrap();

        assert!(store
            .compare_and_set_status(id, &[CampaignStatus::Active], CampaignStatus::Paused)
            .await
            .unwrap());
        assert!(!store
            .compare_and_set_status(id, &[CampaignStatus::Active], CampaignStatus::Paused)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_claim_due_automated_clears_next_run() {
        let store = InMemoryCampaignStore::default();
        let mut campaign = sample_campaign(CampaignStatus::Active);
        campaign.next_run_at = Some(Utc::now() - Duration::minutes(5));
        let id = campaign.campaign_id;
        store.create(campaign).await.unwrap();

        let due = store.claim_due_automated(Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);

        // Second tick finds nothing until next_run_at is set again.
        assert!(store.claim_due_automated(Utc::now()).await.unwrap().is_empty());
        store
            .set_next_run(id, Some(Utc::now() - Duration::minutes(1)))
            .await
            .unwrap();
        assert_eq!(store.claim_due_automated(Utc::now()).await.unwrap().len(), 1);
    }

    fn sample_campaign(status: CampaignStatus) -> Campaign {
        use domain::models::{CampaignChannel, CampaignType};
        Campaign {
            id: 0,
            campaign_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            name: "c".into(),
            campaign_type: CampaignType::Automated,
            channel: CampaignChannel::Sms,
            status,
            segment_filter: FilterConfig::match_all(),
            message_template: Some("hi".into()),
            email_subject_template: None,
            email_body_template: None,
            sender: "INFO".into(),
            scheduled_at: None,
            target_count: 0,
            sent_count: 0,
            delivered_count: 0,
            failed_count: 0,
            total_cost: 0.0,
            email_sent_count: 0,
            email_failed_count: 0,
            email_total_cost: 0.0,
            check_interval_minutes: Some(60),
            cooldown_days: Some(7),
            run_start_hour: None,
            run_end_hour: None,
            ends_at: None,
            next_run_at: None,
            is_test: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
