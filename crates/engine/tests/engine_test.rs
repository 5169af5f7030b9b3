//! End-to-end engine scenarios over the in-memory stores and a
//! scripted provider gateway.

use std::collections::HashMap;
use std::sync::Arc;

use fake::faker::name::en::FirstName;
use fake::Fake;
use serde_json::json;
use uuid::Uuid;

use domain::error::EngineError;
use domain::models::attribute_schema::AttributeDef;
use domain::models::campaign::CreateCampaignRequest;
use domain::models::contact::UpsertContactRequest;
use domain::models::segment::{FilterCondition, FilterConfig, FilterLogic, FilterOperator};
use domain::models::{
    AttributeType, CampaignChannel, CampaignStatus, CampaignType, FailureReason, MessageStatus,
};
use domain::stores::{AccountStore, CampaignStore, ContactStore, MessageStore, SchemaStore};

use engine::config::DispatchConfig;
use engine::dispatch::{Dispatcher, SendContext};
use engine::execution::CampaignService;
use engine::gateway::MockGateway;
use engine::limiter::ChannelLimiter;
use engine::segments::SegmentService;
use engine::webhook::WebhookService;

use persistence::memory::{
    InMemoryAccountStore, InMemoryCampaignStore, InMemoryContactStore, InMemoryCooldownStore,
    InMemoryMessageStore, InMemorySchemaStore, InMemorySegmentStore,
};

struct Harness {
    client_id: Uuid,
    contacts: Arc<InMemoryContactStore>,
    campaigns: Arc<InMemoryCampaignStore>,
    messages: Arc<InMemoryMessageStore>,
    accounts: Arc<InMemoryAccountStore>,
    schemas: Arc<InMemorySchemaStore>,
    gateway: Arc<MockGateway>,
    service: CampaignService,
    segments: SegmentService,
    webhook: WebhookService,
}

fn harness(balance: f64) -> Harness {
    harness_with_senders(balance, vec![])
}

fn harness_with_senders(balance: f64, senders: Vec<String>) -> Harness {
    let client_id = Uuid::new_v4();
    let schemas = Arc::new(InMemorySchemaStore::default());
    let contacts = Arc::new(InMemoryContactStore::default());
    let segment_store = Arc::new(InMemorySegmentStore::default());
    let campaigns = Arc::new(InMemoryCampaignStore::default());
    let messages = Arc::new(InMemoryMessageStore::default());
    let cooldowns = Arc::new(InMemoryCooldownStore::default());
    let accounts = Arc::new(InMemoryAccountStore::with_account(
        client_id, balance, senders,
    ));
    let gateway = Arc::new(MockGateway::default());

    let config = DispatchConfig::default();
    let limiter = Arc::new(ChannelLimiter::new(
        HashMap::from([("sms", 1000u32), ("email", 1000u32)]),
        1000,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        campaigns.clone(),
        contacts.clone(),
        messages.clone(),
        cooldowns.clone(),
        accounts.clone(),
        gateway.clone(),
        limiter,
        config.clone(),
    ));
    let service = CampaignService::new(
        schemas.clone(),
        contacts.clone(),
        campaigns.clone(),
        messages.clone(),
        cooldowns.clone(),
        accounts.clone(),
        dispatcher,
        config,
    );
    let segments = SegmentService::new(schemas.clone(), contacts.clone(), segment_store);
    let webhook = WebhookService::new(messages.clone(), campaigns.clone());

    Harness {
        client_id,
        contacts,
        campaigns,
        messages,
        accounts,
        schemas,
        gateway,
        service,
        segments,
        webhook,
    }
}

async fn seed_contacts(h: &Harness, count: usize) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for i in 0..count {
        let name: String = FirstName().fake();
        let contact = h
            .contacts
            .upsert(
                h.client_id,
                UpsertContactRequest {
                    phone: format!("+4207770001{i:02}"),
                    email: None,
                    attributes: HashMap::from([("name".to_string(), json!(name))]),
                },
            )
            .await
            .unwrap();
        ids.push(contact.contact_id);
    }
    ids
}

fn one_time_request(name: &str) -> CreateCampaignRequest {
    CreateCampaignRequest {
        name: name.to_string(),
        campaign_type: CampaignType::OneTime,
        channel: CampaignChannel::Sms,
        segment_filter: FilterConfig::match_all(),
        message_template: Some("Hello {{name}}".to_string()),
        email_subject_template: None,
        email_body_template: None,
        sender: "INFO".to_string(),
        scheduled_at: None,
        check_interval_minutes: None,
        cooldown_days: Some(7),
        run_start_hour: None,
        run_end_hour: None,
        ends_at: None,
        is_test: false,
    }
}

fn automated_request(name: &str) -> CreateCampaignRequest {
    CreateCampaignRequest {
        campaign_type: CampaignType::Automated,
        check_interval_minutes: Some(60),
        ..one_time_request(name)
    }
}

#[tokio::test]
async fn test_balance_pause_scenario() {
    // Balance 0.10, one segment costs 0.04, ten contacts: exactly two
    // sends fit, then the campaign pauses instead of erroring.
    let h = harness(0.10);
    seed_contacts(&h, 10).await;

    let campaign = h
        .service
        .create(h.client_id, one_time_request("promo"))
        .await
        .unwrap();
    let report = h
        .service
        .execute(campaign.campaign_id, SendContext::real())
        .await
        .unwrap();

    assert_eq!(report.sent, 2);
    assert!((report.total_cost - 0.08).abs() < 1e-9);
    assert!(!report.mock_mode);

    let after = h.campaigns.find(campaign.campaign_id).await.unwrap().unwrap();
    assert_eq!(after.status, CampaignStatus::Paused);
    assert_eq!(after.sent_count, 2);

    let balance = h.accounts.balance(h.client_id).await.unwrap();
    assert!((balance - 0.02).abs() < 1e-9);
    assert_eq!(h.gateway.sent_destinations().len(), 2);
}

#[tokio::test]
async fn test_cooldown_blocks_second_automated_run() {
    let h = harness(100.0);
    seed_contacts(&h, 3).await;

    let campaign = h
        .service
        .create(h.client_id, automated_request("weekly"))
        .await
        .unwrap();
    h.campaigns
        .set_status(campaign.campaign_id, CampaignStatus::Active)
        .await
        .unwrap();
    let campaign = h.campaigns.find(campaign.campaign_id).await.unwrap().unwrap();

    let first = h.service.run_automated(&campaign, SendContext::real()).await.unwrap();
    assert_eq!(first.sent, 3);

    // Everyone is now inside the 7-day cooldown window.
    let second = h.service.run_automated(&campaign, SendContext::real()).await.unwrap();
    assert_eq!(second.sent, 0);

    let history = h
        .messages
        .list_for_campaign(campaign.campaign_id, None, 100)
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn test_retry_reenqueues_transient_only() {
    let h = harness(100.0);
    seed_contacts(&h, 2).await;
    h.gateway
        .fail_destination("+420777000100", FailureReason::InvalidPhone);
    h.gateway
        .fail_destination("+420777000101", FailureReason::Network);

    let campaign = h
        .service
        .create(h.client_id, one_time_request("retry-me"))
        .await
        .unwrap();
    let report = h
        .service
        .execute(campaign.campaign_id, SendContext::real())
        .await
        .unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 2);

    // Failed sends refunded everything.
    let balance = h.accounts.balance(h.client_id).await.unwrap();
    assert!((balance - 100.0).abs() < 1e-9);

    h.gateway.clear_failures();
    let retry = h
        .service
        .retry_failed(campaign.campaign_id, SendContext::real())
        .await
        .unwrap();
    assert_eq!(retry.queued, 1);
    assert_eq!(retry.skipped, 1);
    assert!(retry.skipped_reasons[0].contains("invalid_phone"));

    // The transient contact got its message on the retry pass.
    assert_eq!(h.gateway.sent_destinations(), vec!["+420777000101"]);
    let after = h.campaigns.find(campaign.campaign_id).await.unwrap().unwrap();
    assert_eq!(after.status, CampaignStatus::Completed);
}

#[tokio::test]
async fn test_state_machine_guards() {
    let h = harness(100.0);
    seed_contacts(&h, 2).await;

    // Activating a one-time campaign is rejected.
    let one_time = h
        .service
        .create(h.client_id, one_time_request("ot"))
        .await
        .unwrap();
    let err = h
        .service
        .activate(one_time.campaign_id, SendContext::real())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    // Pausing a draft automated campaign is rejected.
    let automated = h
        .service
        .create(h.client_id, automated_request("auto"))
        .await
        .unwrap();
    let err = h.service.pause(automated.campaign_id).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    // Updating a sending campaign is rejected.
    h.campaigns
        .set_status(one_time.campaign_id, CampaignStatus::Sending)
        .await
        .unwrap();
    let err = h
        .service
        .update(one_time.campaign_id, Default::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    // Deleting an active campaign is rejected.
    h.campaigns
        .set_status(automated.campaign_id, CampaignStatus::Active)
        .await
        .unwrap();
    let err = h.service.delete(automated.campaign_id).await.unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn test_zero_match_filter_rejected_before_persisting() {
    let h = harness(100.0);
    // No contacts seeded at all.
    let err = h
        .service
        .create(h.client_id, one_time_request("empty"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let page = h
        .campaigns
        .list_for_client(h.client_id, Default::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_mock_execution_leaves_balance_untouched() {
    let h = harness(0.05);
    seed_contacts(&h, 4).await;

    let campaign = h
        .service
        .create(h.client_id, one_time_request("dry-run"))
        .await
        .unwrap();
    let report = h
        .service
        .execute(campaign.campaign_id, SendContext::mock())
        .await
        .unwrap();

    assert!(report.mock_mode);
    assert_eq!(report.sent, 4);
    assert!((h.accounts.balance(h.client_id).await.unwrap() - 0.05).abs() < 1e-9);
    // Mock mode never reaches the provider.
    assert!(h.gateway.sent_destinations().is_empty());

    let history = h
        .messages
        .list_for_campaign(campaign.campaign_id, None, 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 4);
    assert!(history.iter().all(|m| m.is_test));
    assert!(history
        .iter()
        .all(|m| m.provider_transaction_id.as_deref().unwrap().starts_with("mock-")));
}

#[tokio::test]
async fn test_webhook_delivery_and_unknown_tx() {
    let h = harness(100.0);
    seed_contacts(&h, 1).await;

    let campaign = h
        .service
        .create(h.client_id, one_time_request("dlr"))
        .await
        .unwrap();
    h.service
        .execute(campaign.campaign_id, SendContext::real())
        .await
        .unwrap();

    let sent = h
        .messages
        .list_for_campaign(campaign.campaign_id, None, 10)
        .await
        .unwrap();
    let tx = sent[0].provider_transaction_id.clone().unwrap();

    // Unknown transaction is accepted and dropped.
    h.webhook.apply_delivery_status("no-such-tx", 1).await.unwrap();

    h.webhook.apply_delivery_status(&tx, 1).await.unwrap();
    let updated = h.messages.find_by_provider_tx(&tx).await.unwrap().unwrap();
    assert_eq!(updated.status, MessageStatus::Delivered);

    let after = h.campaigns.find(campaign.campaign_id).await.unwrap().unwrap();
    assert_eq!(after.delivered_count, 1);

    // A duplicate report is a no-op.
    h.webhook.apply_delivery_status(&tx, 1).await.unwrap();
    let after = h.campaigns.find(campaign.campaign_id).await.unwrap().unwrap();
    assert_eq!(after.delivered_count, 1);
}

#[tokio::test]
async fn test_predicate_consistency_count_vs_matches() {
    let h = harness(100.0);
    h.schemas
        .replace_for_client(
            h.client_id,
            vec![AttributeDef {
                client_id: h.client_id,
                key: "age".into(),
                label: "Age".into(),
                attr_type: AttributeType::Number,
                options: vec![],
                item_type: None,
                properties: vec![],
                required: false,
            }],
        )
        .await
        .unwrap();

    for i in 0..10 {
        h.contacts
            .upsert(
                h.client_id,
                UpsertContactRequest {
                    phone: format!("+4207770002{i:02}"),
                    email: None,
                    attributes: HashMap::from([("age".to_string(), json!(20 + i * 3))]),
                },
            )
            .await
            .unwrap();
    }

    let filter = FilterConfig {
        logic: FilterLogic::And,
        conditions: vec![FilterCondition {
            key: "age".into(),
            operator: FilterOperator::Greater,
            value: json!(30),
        }],
    };

    let count = h.segments.count_matches(h.client_id, &filter).await.unwrap();
    let all = h
        .segments
        .get_matches(h.client_id, &filter, None, 0)
        .await
        .unwrap();
    assert_eq!(all.len() as u64, count);
    assert!(count > 0 && count < 10);

    // A limited query is a prefix of a larger one.
    let three = h
        .segments
        .get_matches(h.client_id, &filter, Some(3), 0)
        .await
        .unwrap();
    let prefix: Vec<Uuid> = all.iter().take(3).map(|c| c.contact_id).collect();
    assert_eq!(
        three.iter().map(|c| c.contact_id).collect::<Vec<_>>(),
        prefix
    );

    // Unknown keys are rejected before any query runs.
    let bad = FilterConfig {
        logic: FilterLogic::And,
        conditions: vec![FilterCondition {
            key: "salary".into(),
            operator: FilterOperator::Greater,
            value: json!(10),
        }],
    };
    let err = h.segments.count_matches(h.client_id, &bad).await.unwrap_err();
    assert!(matches!(err, EngineError::SchemaMismatch { .. }));
}

#[tokio::test]
async fn test_preview_surfaces_per_contact_render_failures() {
    let h = harness(100.0);
    seed_contacts(&h, 2).await;
    // One contact lacks the placeholder attribute entirely.
    h.contacts
        .upsert(
            h.client_id,
            UpsertContactRequest {
                phone: "+420777000999".into(),
                email: None,
                attributes: HashMap::new(),
            },
        )
        .await
        .unwrap();

    let campaign = h
        .service
        .create(h.client_id, one_time_request("preview"))
        .await
        .unwrap();
    let preview = h
        .service
        .preview_messages(campaign.campaign_id, 10)
        .await
        .unwrap();

    assert_eq!(preview.total_count, 3);
    let ok_rows = preview.previews.iter().filter(|r| r.error.is_none()).count();
    let failed_rows: Vec<_> = preview.previews.iter().filter(|r| r.error.is_some()).collect();
    assert_eq!(ok_rows, 2);
    assert_eq!(failed_rows.len(), 1);
    assert_eq!(failed_rows[0].phone, "+420777000999");
    assert!(failed_rows[0].error.as_deref().unwrap().contains("name"));
}

#[tokio::test]
async fn test_activation_blocked_by_broken_template() {
    let h = harness(100.0);
    seed_contacts(&h, 2).await;

    let mut request = automated_request("broken");
    request.message_template = Some("Hi {{missing_key}}".to_string());
    let campaign = h.service.create(h.client_id, request).await.unwrap();

    let err = h
        .service
        .activate(campaign.campaign_id, SendContext::real())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TemplateRender { .. }));

    let after = h.campaigns.find(campaign.campaign_id).await.unwrap().unwrap();
    assert_eq!(after.status, CampaignStatus::Draft);
}

#[tokio::test]
async fn test_activation_sets_next_run() {
    let h = harness(100.0);
    seed_contacts(&h, 2).await;

    let campaign = h
        .service
        .create(h.client_id, automated_request("cadence"))
        .await
        .unwrap();
    let activated = h
        .service
        .activate(campaign.campaign_id, SendContext::real())
        .await
        .unwrap();

    assert_eq!(activated.status, CampaignStatus::Active);
    assert!(activated.next_run_at.is_some());

    // Pause keeps the cadence for a later resume.
    h.service.pause(campaign.campaign_id).await.unwrap();
    let paused = h.campaigns.find(campaign.campaign_id).await.unwrap().unwrap();
    assert_eq!(paused.status, CampaignStatus::Paused);
    assert!(paused.next_run_at.is_some());
}

#[tokio::test]
async fn test_validate_campaign_balance_check_respects_mode() {
    let h = harness(0.0);
    seed_contacts(&h, 2).await;

    let campaign = h
        .service
        .create(h.client_id, one_time_request("checks"))
        .await
        .unwrap();
    let campaign = h.campaigns.find(campaign.campaign_id).await.unwrap().unwrap();

    let violations = h
        .service
        .validate_campaign(&campaign, SendContext::real())
        .await
        .unwrap();
    // Zero balance cannot cover two messages.
    assert!(violations.iter().any(|v| v.field == "balance"));

    // Test mode skips the balance check.
    let violations = h
        .service
        .validate_campaign(&campaign, SendContext::mock())
        .await
        .unwrap();
    assert!(violations.is_empty());
}

#[tokio::test]
async fn test_validate_campaign_rejects_unlisted_sender() {
    let h = harness_with_senders(100.0, vec!["BRAND".to_string()]);
    seed_contacts(&h, 2).await;

    let campaign = h
        .service
        .create(h.client_id, one_time_request("sender-check"))
        .await
        .unwrap();
    let campaign = h.campaigns.find(campaign.campaign_id).await.unwrap().unwrap();

    // The request uses sender INFO; the account only allows BRAND.
    let violations = h
        .service
        .validate_campaign(&campaign, SendContext::real())
        .await
        .unwrap();
    assert!(violations.iter().any(|v| v.field == "sender"));
}
