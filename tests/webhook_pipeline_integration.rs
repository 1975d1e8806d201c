//! Integration tests for the webhook ingestion pipeline.
//!
//! Exercises the full verify -> claim -> parse -> converge -> record flow
//! over the in-memory adapters: duplicate deliveries, out-of-order
//! events, equal-timestamp precedence, stale processing leases, thin
//! events, and metadata-only correlation.

use std::sync::Arc;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use payguard::adapters::memory::{
    InMemoryPaymentStore, InMemoryRefundStore, InMemorySubscriptionStore,
    InMemoryWebhookEventStore,
};
use payguard::domain::foundation::{DomainError, UserId};
use payguard::domain::payments::{
    ConvergenceEngine, IngestOutcome, PaymentRecord, PaymentStatus, SubscriptionRecord,
    SubscriptionStatus, WebhookPipeline, WebhookVerifier,
};
use payguard::ports::{
    ObjectLookup, PaymentRecordStore, SubscriptionRecordStore, WebhookEventStore,
};

const SECRET: &str = "whsec_integration_test";

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Lookup resolving a single known thin-invoice linkage.
struct SingleLinkLookup {
    invoice_id: String,
    subscription_id: String,
}

#[async_trait]
impl ObjectLookup for SingleLinkLookup {
    async fn get_payment_intent_id(&self, _object_id: &str) -> Result<Option<String>, DomainError> {
        Ok(None)
    }

    async fn get_subscription_id(&self, object_id: &str) -> Result<Option<String>, DomainError> {
        if object_id == self.invoice_id {
            Ok(Some(self.subscription_id.clone()))
        } else {
            Ok(None)
        }
    }
}

struct NoLookup;

#[async_trait]
impl ObjectLookup for NoLookup {
    async fn get_payment_intent_id(&self, _object_id: &str) -> Result<Option<String>, DomainError> {
        Ok(None)
    }

    async fn get_subscription_id(&self, _object_id: &str) -> Result<Option<String>, DomainError> {
        Ok(None)
    }
}

struct Stack {
    payments: Arc<InMemoryPaymentStore>,
    subscriptions: Arc<InMemorySubscriptionStore>,
    dedupe: Arc<InMemoryWebhookEventStore>,
    pipeline: WebhookPipeline,
}

fn stack_with(lookup: Arc<dyn ObjectLookup>, dedupe: InMemoryWebhookEventStore) -> Stack {
    let payments = Arc::new(InMemoryPaymentStore::new());
    let subscriptions = Arc::new(InMemorySubscriptionStore::new());
    let refunds = Arc::new(InMemoryRefundStore::new());
    let dedupe = Arc::new(dedupe);
    let engine = ConvergenceEngine::new(
        payments.clone(),
        subscriptions.clone(),
        refunds,
        lookup,
    );
    let pipeline = WebhookPipeline::new(WebhookVerifier::new(SECRET), dedupe.clone(), engine);
    Stack {
        payments,
        subscriptions,
        dedupe,
        pipeline,
    }
}

fn stack() -> Stack {
    stack_with(Arc::new(NoLookup), InMemoryWebhookEventStore::new())
}

fn sign(payload: &[u8]) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn event_body(event_id: &str, event_type: &str, created: i64, object: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": event_id,
        "type": event_type,
        "created": created,
        "data": { "object": object }
    }))
    .unwrap()
}

fn user_a() -> UserId {
    UserId::new("user_A").unwrap()
}

async fn deliver(stack: &Stack, body: &[u8]) -> IngestOutcome {
    stack.pipeline.ingest(body, &sign(body)).await.unwrap()
}

// =============================================================================
// S1 - Happy payment success + terminal duplicate
// =============================================================================

#[tokio::test]
async fn happy_payment_success_then_duplicate() {
    let stack = stack();
    stack
        .payments
        .save(&PaymentRecord::pending(user_a(), "biz_pay_1").with_payment_intent("pi_1"))
        .await
        .unwrap();

    let body = event_body(
        "evt_1",
        "payment_intent.succeeded",
        1700000000,
        json!({ "id": "pi_1", "object": "payment_intent", "status": "succeeded" }),
    );

    let first = deliver(&stack, &body).await;
    assert!(first.applied_successfully());

    let record = stack
        .payments
        .get_by_provider_id("pi_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Succeeded);
    assert_eq!(record.last_event_created_at, Some(1700000000));

    let outcome = stack.dedupe.get_outcome("evt_1").await.unwrap().unwrap();
    assert!(outcome.succeeded);

    // Re-delivery of the same body answers from the dedupe store
    let replay = deliver(&stack, &body).await;
    assert!(replay.is_duplicate());

    let unchanged = stack
        .payments
        .get_by_provider_id("pi_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged, record);
}

// =============================================================================
// S2 - Out-of-order cancel beats late success
// =============================================================================

#[tokio::test]
async fn out_of_order_cancel_beats_late_success() {
    let stack = stack();
    let mut record = SubscriptionRecord::incomplete(user_a(), "biz_sub_1").with_subscription("sub_1");
    record.status = SubscriptionStatus::Active;
    stack.subscriptions.save(&record).await.unwrap();

    let cancel = event_body(
        "evt_a",
        "customer.subscription.deleted",
        1700000100,
        json!({ "id": "sub_1", "object": "subscription", "status": "canceled" }),
    );
    let late_success = event_body(
        "evt_b",
        "invoice.payment_succeeded",
        1700000000,
        json!({ "id": "in_1", "object": "invoice", "subscription": "sub_1", "status": "paid" }),
    );

    let first = deliver(&stack, &cancel).await;
    let second = deliver(&stack, &late_success).await;

    // The late success is absorbed as a no-op, not a failure
    assert!(first.applied_successfully());
    assert!(second.applied_successfully());

    let record = stack
        .subscriptions
        .get_by_provider_id("sub_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, SubscriptionStatus::Canceled);
    assert_eq!(record.last_event_created_at, Some(1700000100));

    assert!(stack.dedupe.get_outcome("evt_a").await.unwrap().unwrap().succeeded);
    assert!(stack.dedupe.get_outcome("evt_b").await.unwrap().unwrap().succeeded);
}

// =============================================================================
// S3 - Equal-timestamp precedence
// =============================================================================

#[tokio::test]
async fn equal_timestamp_success_beats_failure() {
    let stack = stack();
    stack
        .payments
        .save(&PaymentRecord::pending(user_a(), "biz_pay_e").with_payment_intent("pi_e"))
        .await
        .unwrap();

    let failed = event_body(
        "evt_f",
        "payment_intent.payment_failed",
        1700000300,
        json!({ "id": "pi_e", "object": "payment_intent", "status": "requires_payment_method" }),
    );
    let succeeded = event_body(
        "evt_s",
        "payment_intent.succeeded",
        1700000300,
        json!({ "id": "pi_e", "object": "payment_intent", "status": "succeeded" }),
    );

    deliver(&stack, &failed).await;
    deliver(&stack, &succeeded).await;

    let record = stack
        .payments
        .get_by_provider_id("pi_e")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Succeeded);
    assert_eq!(record.last_event_created_at, Some(1700000300));
}

// =============================================================================
// S4 - Stale processing lease takeover
// =============================================================================

#[tokio::test]
async fn stale_processing_lease_is_taken_over() {
    let stack = stack_with(
        Arc::new(NoLookup),
        InMemoryWebhookEventStore::with_lease(chrono::Duration::milliseconds(100)),
    );
    stack
        .payments
        .save(&PaymentRecord::pending(user_a(), "biz_pay_1").with_payment_intent("pi_1"))
        .await
        .unwrap();

    // A crashed handler claimed the event and never recorded an outcome
    assert!(stack.dedupe.try_begin("evt_1").await.unwrap());

    let body = event_body(
        "evt_1",
        "payment_intent.succeeded",
        1700000000,
        json!({ "id": "pi_1", "object": "payment_intent" }),
    );

    // Under the live lease the delivery is a non-terminal duplicate
    match deliver(&stack, &body).await {
        IngestOutcome::NonTerminalDuplicate { outcome } => assert!(outcome.is_none()),
        other => panic!("expected non-terminal duplicate, got {:?}", other),
    }

    // After the lease expires the next delivery takes over and applies
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    let taken_over = deliver(&stack, &body).await;
    assert!(taken_over.applied_successfully());

    let record = stack
        .payments
        .get_by_provider_id("pi_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Succeeded);
}

// =============================================================================
// S5 - Thin invoice event resolved by object lookup
// =============================================================================

#[tokio::test]
async fn thin_invoice_event_resolves_subscription() {
    let stack = stack_with(
        Arc::new(SingleLinkLookup {
            invoice_id: "in_x".to_string(),
            subscription_id: "sub_x".to_string(),
        }),
        InMemoryWebhookEventStore::new(),
    );
    stack
        .subscriptions
        .save(&SubscriptionRecord::incomplete(user_a(), "biz_sub_x").with_subscription("sub_x"))
        .await
        .unwrap();

    let body = event_body(
        "evt_thin",
        "invoice.payment_succeeded",
        1700000000,
        json!({ "id": "in_x", "object": "invoice" }),
    );

    let outcome = deliver(&stack, &body).await;
    assert!(outcome.applied_successfully());

    let record = stack
        .subscriptions
        .get_by_provider_id("sub_x")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, SubscriptionStatus::Active);
}

// =============================================================================
// S6 - Metadata correlation backfills the provider id
// =============================================================================

#[tokio::test]
async fn metadata_correlation_backfills_provider_id_and_index() {
    let stack = stack();
    // Staged before the provider assigned a payment intent
    stack
        .payments
        .save(&PaymentRecord::pending(user_a(), "biz_pay_1"))
        .await
        .unwrap();

    let body = event_body(
        "evt_meta",
        "payment_intent.succeeded",
        1700000000,
        json!({
            "id": "pi_new",
            "object": "payment_intent",
            "status": "succeeded",
            "metadata": { "business_payment_id": "biz_pay_1" }
        }),
    );

    let outcome = deliver(&stack, &body).await;
    assert!(outcome.applied_successfully());

    // The secondary index now maps the discovered provider id
    let record = stack
        .payments
        .get_by_provider_id("pi_new")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.business_payment_id, "biz_pay_1");
    assert_eq!(record.status, PaymentStatus::Succeeded);
    assert_eq!(record.payment_intent_id.as_deref(), Some("pi_new"));
}

// =============================================================================
// Boundary behaviors
// =============================================================================

#[tokio::test]
async fn out_of_tolerance_timestamp_rejected_before_dedupe() {
    let stack = stack();
    let body = event_body(
        "evt_old",
        "payment_intent.succeeded",
        1700000000,
        json!({ "id": "pi_1", "object": "payment_intent" }),
    );

    let timestamp = chrono::Utc::now().timestamp() - 600;
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(&body);
    let header = format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()));

    let result = stack.pipeline.ingest(&body, &header).await;

    assert!(result.is_err());
    assert!(stack.dedupe.get_outcome("evt_old").await.unwrap().is_none());
}

#[tokio::test]
async fn event_without_created_applies_without_watermark_update() {
    let stack = stack();
    let mut record = PaymentRecord::pending(user_a(), "biz_pay_1").with_payment_intent("pi_1");
    record.last_event_created_at = Some(1700000000);
    stack.payments.save(&record).await.unwrap();

    let body = serde_json::to_vec(&json!({
        "id": "evt_nc",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": "pi_1", "object": "payment_intent" } }
    }))
    .unwrap();

    let outcome = deliver(&stack, &body).await;
    assert!(outcome.applied_successfully());

    let record = stack
        .payments
        .get_by_provider_id("pi_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, PaymentStatus::Succeeded);
    assert_eq!(record.last_event_created_at, Some(1700000000));
}

#[tokio::test]
async fn failed_attempt_is_retriable_on_redelivery() {
    let stack = stack();
    let body = event_body(
        "evt_retry",
        "payment_intent.succeeded",
        1700000000,
        json!({ "id": "pi_1", "object": "payment_intent" }),
    );

    // No record yet: the first attempt records a failure
    match deliver(&stack, &body).await {
        IngestOutcome::Applied { outcome } => {
            assert!(!outcome.succeeded);
            let message = outcome.error_message.unwrap();
            assert!(message.contains("evt_retry"));
        }
        other => panic!("expected applied failure, got {:?}", other),
    }

    // The record appears (checkout collaborator catches up), redelivery heals
    stack
        .payments
        .save(&PaymentRecord::pending(user_a(), "biz_pay_1").with_payment_intent("pi_1"))
        .await
        .unwrap();

    let retried = deliver(&stack, &body).await;
    assert!(retried.applied_successfully());
}
