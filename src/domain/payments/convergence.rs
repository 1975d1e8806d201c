//! Convergence engine - Applies parsed events to records.
//!
//! Deliveries arrive duplicated, delayed, and out of order. The engine
//! makes record state converge to what the provider's newest information
//! implies, regardless of arrival order:
//!
//! 1. Dispatch on the event kind to find the target record type and the
//!    desired successor status.
//! 2. Resolve the target's provider id, asking the object lookup when the
//!    payload was thin.
//! 3. Load the record by provider id, falling back to the business id
//!    recovered from metadata when the provider id is not yet indexed.
//! 4. Admit or reject the transition: terminal states never regress, older
//!    events never overwrite newer ones, and equal-timestamp conflicts are
//!    settled by the status precedence ladder.
//! 5. Write the successor, refreshing `last_event_created_at` and
//!    backfilling provider ids the record was missing.
//!
//! Rejected transitions and unsupported events are acknowledged successes:
//! redelivering them must not produce retry storms.

use std::sync::Arc;

use super::parser::ParsedEvent;
use super::records::{PaymentStatus, RefundStatus, SubscriptionStatus};
use super::stripe_event::EventKind;
use super::webhook_errors::WebhookError;
use crate::ports::{
    ObjectLookup, PaymentRecordStore, RefundRecordStore, SubscriptionRecordStore,
    WebhookEventOutcome,
};

/// Per-module enablement for the engine.
///
/// An event targeting a disabled module is acknowledged as a no-op
/// success, so the dedupe store records success and the provider stops
/// redelivering it.
#[derive(Debug, Clone, Copy)]
pub struct ModuleFlags {
    /// One-off payment events (`payment_intent.*`).
    pub payments: bool,
    /// Subscription billing events (`invoice.*`, `customer.subscription.*`).
    pub billing: bool,
    /// Refund events (`refund.*`).
    pub refunds: bool,
}

impl Default for ModuleFlags {
    fn default() -> Self {
        Self {
            payments: true,
            billing: true,
            refunds: true,
        }
    }
}

/// What processing an event did to the target record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    /// A successor record was written.
    Transitioned,
    /// The event was acknowledged without touching any record.
    NoOp,
}

/// Applies parsed events to payment, subscription, and refund records.
pub struct ConvergenceEngine {
    payments: Arc<dyn PaymentRecordStore>,
    subscriptions: Arc<dyn SubscriptionRecordStore>,
    refunds: Arc<dyn RefundRecordStore>,
    lookup: Arc<dyn ObjectLookup>,
    modules: ModuleFlags,
}

impl ConvergenceEngine {
    pub fn new(
        payments: Arc<dyn PaymentRecordStore>,
        subscriptions: Arc<dyn SubscriptionRecordStore>,
        refunds: Arc<dyn RefundRecordStore>,
        lookup: Arc<dyn ObjectLookup>,
    ) -> Self {
        Self {
            payments,
            subscriptions,
            refunds,
            lookup,
            modules: ModuleFlags::default(),
        }
    }

    /// Overrides module enablement.
    pub fn with_modules(mut self, modules: ModuleFlags) -> Self {
        self.modules = modules;
        self
    }

    /// Processes one parsed event into an outcome.
    ///
    /// Never panics and never lets an error escape: every failure becomes
    /// a failed outcome carrying the provider event id, ready for
    /// `record_outcome`.
    pub async fn process(&self, event: &ParsedEvent) -> WebhookEventOutcome {
        match self.apply(event).await {
            Ok(applied) => {
                tracing::debug!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    transitioned = matches!(applied, Applied::Transitioned),
                    "event converged"
                );
                WebhookEventOutcome::success()
            }
            Err(err) => {
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %err,
                    "event processing failed"
                );
                WebhookEventOutcome::failure(format!("{}: {}", event.id, err))
            }
        }
    }

    async fn apply(&self, event: &ParsedEvent) -> Result<Applied, WebhookError> {
        match event.kind {
            EventKind::PaymentIntentSucceeded => {
                self.apply_payment(event, PaymentStatus::Succeeded).await
            }
            EventKind::PaymentIntentFailed => {
                self.apply_payment(event, PaymentStatus::Failed).await
            }
            EventKind::InvoicePaymentSucceeded => {
                self.apply_subscription(event, SubscriptionStatus::Active).await
            }
            EventKind::InvoicePaymentFailed => {
                self.apply_subscription(event, SubscriptionStatus::PastDue).await
            }
            EventKind::SubscriptionDeleted => {
                self.apply_subscription(event, SubscriptionStatus::Canceled).await
            }
            EventKind::SubscriptionCreated | EventKind::SubscriptionUpdated => {
                match event
                    .object_status
                    .as_deref()
                    .and_then(SubscriptionStatus::from_provider)
                {
                    Some(status) => self.apply_subscription(event, status).await,
                    None => Ok(Applied::NoOp),
                }
            }
            EventKind::RefundCreated | EventKind::RefundUpdated => {
                match event
                    .object_status
                    .as_deref()
                    .and_then(RefundStatus::from_provider)
                {
                    Some(status) => self.apply_refund(event, status).await,
                    None => Ok(Applied::NoOp),
                }
            }
            EventKind::RefundFailed => self.apply_refund(event, RefundStatus::Failed).await,
            EventKind::Unsupported => Ok(Applied::NoOp),
        }
    }

    // ── Payments ─────────────────────────────────────────────────────

    async fn apply_payment(
        &self,
        event: &ParsedEvent,
        incoming: PaymentStatus,
    ) -> Result<Applied, WebhookError> {
        if !self.modules.payments {
            return Ok(Applied::NoOp);
        }

        let payment_intent_id = match &event.payment_intent_id {
            Some(id) => id.clone(),
            None => match &event.object_id {
                Some(object_id) => self
                    .lookup
                    .get_payment_intent_id(object_id)
                    .await
                    .map_err(|e| WebhookError::Store(e.to_string()))?
                    .ok_or(WebhookError::MissingLinkedId("payment_intent_id"))?,
                None => return Err(WebhookError::MissingLinkedId("payment_intent_id")),
            },
        };

        let current = self
            .payments
            .get_by_provider_id(&payment_intent_id)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;

        // A record staged before the provider id was known is reachable
        // only through the business id carried in metadata.
        let current = match current {
            Some(record) => record,
            None => match &event.business_payment_id {
                Some(business_id) => self
                    .payments
                    .get_by_business_id(business_id)
                    .await
                    .map_err(|e| WebhookError::Store(e.to_string()))?
                    .ok_or_else(|| WebhookError::RecordNotFound(payment_intent_id.clone()))?,
                None => return Err(WebhookError::RecordNotFound(payment_intent_id)),
            },
        };

        if !admit(
            current.status.precedence(),
            current.status == PaymentStatus::Succeeded && incoming != PaymentStatus::Succeeded
                || current.status == PaymentStatus::Canceled && incoming != PaymentStatus::Canceled,
            incoming.precedence(),
            current.last_event_created_at,
            event.created_at,
        ) {
            return Ok(Applied::NoOp);
        }

        let mut successor = current;
        successor.status = incoming;
        successor.payment_intent_id = Some(payment_intent_id);
        if let Some(created) = event.created_at {
            successor.last_event_created_at = Some(
                successor
                    .last_event_created_at
                    .map_or(created, |last| last.max(created)),
            );
        }

        self.payments
            .save(&successor)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;
        Ok(Applied::Transitioned)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    async fn apply_subscription(
        &self,
        event: &ParsedEvent,
        incoming: SubscriptionStatus,
    ) -> Result<Applied, WebhookError> {
        if !self.modules.billing {
            return Ok(Applied::NoOp);
        }

        let subscription_id = match &event.subscription_id {
            Some(id) => id.clone(),
            None => match &event.object_id {
                Some(object_id) => self
                    .lookup
                    .get_subscription_id(object_id)
                    .await
                    .map_err(|e| WebhookError::Store(e.to_string()))?
                    .ok_or(WebhookError::MissingLinkedId("subscription_id"))?,
                None => return Err(WebhookError::MissingLinkedId("subscription_id")),
            },
        };

        let current = self
            .subscriptions
            .get_by_provider_id(&subscription_id)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;

        let current = match current {
            Some(record) => record,
            None => match &event.business_subscription_id {
                Some(business_id) => self
                    .subscriptions
                    .get_by_business_id(business_id)
                    .await
                    .map_err(|e| WebhookError::Store(e.to_string()))?
                    .ok_or_else(|| WebhookError::RecordNotFound(subscription_id.clone()))?,
                None => return Err(WebhookError::RecordNotFound(subscription_id)),
            },
        };

        if !admit(
            current.status.precedence(),
            current.status == SubscriptionStatus::Canceled
                && incoming != SubscriptionStatus::Canceled,
            incoming.precedence(),
            current.last_event_created_at,
            event.created_at,
        ) {
            return Ok(Applied::NoOp);
        }

        let mut successor = current;
        successor.status = incoming;
        successor.subscription_id = Some(subscription_id);
        if successor.customer_id.is_none() {
            successor.customer_id = event.customer_id.clone();
        }
        if let Some(created) = event.created_at {
            successor.last_event_created_at = Some(
                successor
                    .last_event_created_at
                    .map_or(created, |last| last.max(created)),
            );
        }

        self.subscriptions
            .save(&successor)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;
        Ok(Applied::Transitioned)
    }

    // ── Refunds ──────────────────────────────────────────────────────

    async fn apply_refund(
        &self,
        event: &ParsedEvent,
        incoming: RefundStatus,
    ) -> Result<Applied, WebhookError> {
        if !self.modules.refunds {
            return Ok(Applied::NoOp);
        }

        let refund_id = event
            .refund_id
            .clone()
            .or_else(|| event.object_id.clone())
            .ok_or(WebhookError::MissingLinkedId("refund_id"))?;

        let current = self
            .refunds
            .get_by_provider_id(&refund_id)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?
            .ok_or_else(|| WebhookError::RecordNotFound(refund_id.clone()))?;

        // Refund lifecycle is not re-entrant; the newest word wins.
        let mut successor = current;
        successor.status = incoming;
        successor.refund_id = Some(refund_id);
        if successor.payment_intent_id.is_none() {
            successor.payment_intent_id = event.payment_intent_id.clone();
        }

        self.refunds
            .save(&successor)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;
        Ok(Applied::Transitioned)
    }
}

/// Shared admission predicate for payments and subscriptions.
///
/// `terminal_conflict` is true when the current status is terminal and the
/// incoming status differs from it. With both timestamps present, older
/// events are rejected and equal-timestamp conflicts are settled by the
/// precedence ladder; with either timestamp absent, the terminal rules
/// alone decide.
fn admit(
    current_precedence: u8,
    terminal_conflict: bool,
    incoming_precedence: u8,
    last_event_created_at: Option<i64>,
    incoming_created_at: Option<i64>,
) -> bool {
    if terminal_conflict {
        return false;
    }

    if let (Some(last), Some(incoming)) = (last_event_created_at, incoming_created_at) {
        if incoming < last {
            return false;
        }
        if incoming == last && incoming_precedence < current_precedence {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryPaymentStore, InMemoryRefundStore, InMemorySubscriptionStore,
    };
    use crate::domain::foundation::{DomainError, UserId};
    use crate::domain::payments::{PaymentRecord, RefundRecord, SubscriptionRecord};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    // ══════════════════════════════════════════════════════════════
    // Test Infrastructure
    // ══════════════════════════════════════════════════════════════

    /// Lookup backed by a fixed table; no provider calls.
    struct TableLookup {
        payment_intents: HashMap<String, String>,
        subscriptions: HashMap<String, String>,
    }

    impl TableLookup {
        fn empty() -> Self {
            Self {
                payment_intents: HashMap::new(),
                subscriptions: HashMap::new(),
            }
        }

        fn with_subscription(object_id: &str, subscription_id: &str) -> Self {
            let mut lookup = Self::empty();
            lookup
                .subscriptions
                .insert(object_id.to_string(), subscription_id.to_string());
            lookup
        }
    }

    #[async_trait]
    impl ObjectLookup for TableLookup {
        async fn get_payment_intent_id(
            &self,
            object_id: &str,
        ) -> Result<Option<String>, DomainError> {
            Ok(self.payment_intents.get(object_id).cloned())
        }

        async fn get_subscription_id(
            &self,
            object_id: &str,
        ) -> Result<Option<String>, DomainError> {
            Ok(self.subscriptions.get(object_id).cloned())
        }
    }

    struct Harness {
        payments: Arc<InMemoryPaymentStore>,
        subscriptions: Arc<InMemorySubscriptionStore>,
        refunds: Arc<InMemoryRefundStore>,
        engine: ConvergenceEngine,
    }

    fn harness_with_lookup(lookup: TableLookup) -> Harness {
        let payments = Arc::new(InMemoryPaymentStore::new());
        let subscriptions = Arc::new(InMemorySubscriptionStore::new());
        let refunds = Arc::new(InMemoryRefundStore::new());
        let engine = ConvergenceEngine::new(
            payments.clone(),
            subscriptions.clone(),
            refunds.clone(),
            Arc::new(lookup),
        );
        Harness {
            payments,
            subscriptions,
            refunds,
            engine,
        }
    }

    fn harness() -> Harness {
        harness_with_lookup(TableLookup::empty())
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn parsed(event_type: &str, created: Option<i64>, object: serde_json::Value) -> ParsedEvent {
        let mut envelope = json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": object }
        });
        if let Some(created) = created {
            envelope["created"] = json!(created);
        }
        ParsedEvent::from_raw_body(&serde_json::to_vec(&envelope).unwrap()).unwrap()
    }

    async fn seed_payment(h: &Harness, status: PaymentStatus, last: Option<i64>) {
        let mut record = PaymentRecord::pending(user(), "biz_pay_1").with_payment_intent("pi_1");
        record.status = status;
        record.last_event_created_at = last;
        h.payments.save(&record).await.unwrap();
    }

    async fn seed_subscription(h: &Harness, status: SubscriptionStatus, last: Option<i64>) {
        let mut record =
            SubscriptionRecord::incomplete(user(), "biz_sub_1").with_subscription("sub_1");
        record.status = status;
        record.last_event_created_at = last;
        h.subscriptions.save(&record).await.unwrap();
    }

    fn pi_event(event_type: &str, created: Option<i64>) -> ParsedEvent {
        parsed(
            event_type,
            created,
            json!({ "id": "pi_1", "object": "payment_intent" }),
        )
    }

    // ══════════════════════════════════════════════════════════════
    // Payment Transitions
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn payment_succeeded_transitions_pending_record() {
        let h = harness();
        seed_payment(&h, PaymentStatus::Pending, None).await;

        let outcome = h
            .engine
            .process(&pi_event("payment_intent.succeeded", Some(1700000000)))
            .await;

        assert!(outcome.succeeded);
        let record = h.payments.get_by_provider_id("pi_1").await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Succeeded);
        assert_eq!(record.last_event_created_at, Some(1700000000));
    }

    #[tokio::test]
    async fn payment_failed_does_not_regress_succeeded_record() {
        let h = harness();
        seed_payment(&h, PaymentStatus::Succeeded, Some(1700000000)).await;

        let outcome = h
            .engine
            .process(&pi_event("payment_intent.payment_failed", Some(1700000100)))
            .await;

        // Terminal rejection is still an acknowledged success
        assert!(outcome.succeeded);
        let record = h.payments.get_by_provider_id("pi_1").await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Succeeded);
        assert_eq!(record.last_event_created_at, Some(1700000000));
    }

    #[tokio::test]
    async fn older_event_is_rejected_by_timestamp_guard() {
        let h = harness();
        seed_payment(&h, PaymentStatus::Failed, Some(1700000200)).await;

        let outcome = h
            .engine
            .process(&pi_event("payment_intent.succeeded", Some(1700000100)))
            .await;

        assert!(outcome.succeeded);
        let record = h.payments.get_by_provider_id("pi_1").await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn equal_timestamp_higher_precedence_wins() {
        let h = harness();
        seed_payment(&h, PaymentStatus::Failed, Some(1700000300)).await;

        let outcome = h
            .engine
            .process(&pi_event("payment_intent.succeeded", Some(1700000300)))
            .await;

        assert!(outcome.succeeded);
        let record = h.payments.get_by_provider_id("pi_1").await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Succeeded);
        assert_eq!(record.last_event_created_at, Some(1700000300));
    }

    #[tokio::test]
    async fn equal_timestamp_lower_precedence_is_rejected() {
        let h = harness();
        seed_payment(&h, PaymentStatus::Succeeded, Some(1700000300)).await;

        let outcome = h
            .engine
            .process(&pi_event("payment_intent.payment_failed", Some(1700000300)))
            .await;

        assert!(outcome.succeeded);
        let record = h.payments.get_by_provider_id("pi_1").await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn event_without_created_applies_but_leaves_watermark() {
        let h = harness();
        seed_payment(&h, PaymentStatus::Pending, Some(1700000000)).await;

        let outcome = h.engine.process(&pi_event("payment_intent.succeeded", None)).await;

        assert!(outcome.succeeded);
        let record = h.payments.get_by_provider_id("pi_1").await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Succeeded);
        assert_eq!(record.last_event_created_at, Some(1700000000));
    }

    #[tokio::test]
    async fn payment_record_missing_is_failure() {
        let h = harness();

        let outcome = h
            .engine
            .process(&pi_event("payment_intent.succeeded", Some(1700000000)))
            .await;

        assert!(!outcome.succeeded);
        let message = outcome.error_message.unwrap();
        assert!(message.contains("evt_1"));
        assert!(message.contains("pi_1"));
    }

    #[tokio::test]
    async fn metadata_business_id_locates_record_and_backfills_provider_id() {
        let h = harness();
        // Staged before the provider assigned a payment intent
        h.payments
            .save(&PaymentRecord::pending(user(), "biz_pay_1"))
            .await
            .unwrap();

        let event = parsed(
            "payment_intent.succeeded",
            Some(1700000000),
            json!({
                "id": "pi_new",
                "object": "payment_intent",
                "metadata": { "business_payment_id": "biz_pay_1" }
            }),
        );
        let outcome = h.engine.process(&event).await;

        assert!(outcome.succeeded);
        let by_provider = h.payments.get_by_provider_id("pi_new").await.unwrap().unwrap();
        assert_eq!(by_provider.business_payment_id, "biz_pay_1");
        assert_eq!(by_provider.status, PaymentStatus::Succeeded);
        assert_eq!(by_provider.payment_intent_id.as_deref(), Some("pi_new"));
    }

    // ══════════════════════════════════════════════════════════════
    // Subscription Transitions
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn invoice_payment_succeeded_activates_subscription() {
        let h = harness();
        seed_subscription(&h, SubscriptionStatus::Incomplete, None).await;

        let event = parsed(
            "invoice.payment_succeeded",
            Some(1700000000),
            json!({ "id": "in_1", "object": "invoice", "subscription": "sub_1" }),
        );
        let outcome = h.engine.process(&event).await;

        assert!(outcome.succeeded);
        let record = h
            .subscriptions
            .get_by_provider_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn canceled_subscription_rejects_late_success() {
        let h = harness();
        seed_subscription(&h, SubscriptionStatus::Canceled, Some(1700000100)).await;

        let event = parsed(
            "invoice.payment_succeeded",
            Some(1700000000),
            json!({ "id": "in_1", "object": "invoice", "subscription": "sub_1" }),
        );
        let outcome = h.engine.process(&event).await;

        // No-op success: the cancel stands, the late success is absorbed
        assert!(outcome.succeeded);
        let record = h
            .subscriptions
            .get_by_provider_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubscriptionStatus::Canceled);
        assert_eq!(record.last_event_created_at, Some(1700000100));
    }

    #[tokio::test]
    async fn redelivered_cancel_refreshes_watermark() {
        let h = harness();
        seed_subscription(&h, SubscriptionStatus::Canceled, Some(1700000100)).await;

        let event = parsed(
            "customer.subscription.deleted",
            Some(1700000200),
            json!({ "id": "sub_1", "object": "subscription", "status": "canceled" }),
        );
        let outcome = h.engine.process(&event).await;

        assert!(outcome.succeeded);
        let record = h
            .subscriptions
            .get_by_provider_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubscriptionStatus::Canceled);
        assert_eq!(record.last_event_created_at, Some(1700000200));
    }

    #[tokio::test]
    async fn subscription_updated_maps_provider_status() {
        let h = harness();
        seed_subscription(&h, SubscriptionStatus::Active, Some(1700000000)).await;

        let event = parsed(
            "customer.subscription.updated",
            Some(1700000100),
            json!({ "id": "sub_1", "object": "subscription", "status": "past_due" }),
        );
        h.engine.process(&event).await;

        let record = h
            .subscriptions
            .get_by_provider_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubscriptionStatus::PastDue);
    }

    #[tokio::test]
    async fn subscription_updated_unmapped_status_is_noop() {
        let h = harness();
        seed_subscription(&h, SubscriptionStatus::Active, Some(1700000000)).await;

        let event = parsed(
            "customer.subscription.updated",
            Some(1700000100),
            json!({ "id": "sub_1", "object": "subscription", "status": "paused" }),
        );
        let outcome = h.engine.process(&event).await;

        assert!(outcome.succeeded);
        let record = h
            .subscriptions
            .get_by_provider_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.last_event_created_at, Some(1700000000));
    }

    #[tokio::test]
    async fn subscription_event_backfills_customer_id() {
        let h = harness();
        seed_subscription(&h, SubscriptionStatus::Incomplete, None).await;

        let event = parsed(
            "customer.subscription.updated",
            Some(1700000000),
            json!({
                "id": "sub_1",
                "object": "subscription",
                "status": "active",
                "customer": "cus_1"
            }),
        );
        h.engine.process(&event).await;

        let record = h
            .subscriptions
            .get_by_provider_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.customer_id.as_deref(), Some("cus_1"));
    }

    // ══════════════════════════════════════════════════════════════
    // Thin Events
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn thin_invoice_resolves_subscription_via_lookup() {
        let h = harness_with_lookup(TableLookup::with_subscription("in_x", "sub_1"));
        seed_subscription(&h, SubscriptionStatus::Incomplete, None).await;

        let event = parsed(
            "invoice.payment_succeeded",
            Some(1700000000),
            json!({ "id": "in_x", "object": "invoice" }),
        );
        let outcome = h.engine.process(&event).await;

        assert!(outcome.succeeded);
        let record = h
            .subscriptions
            .get_by_provider_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn thin_invoice_without_linkage_is_missing_linked_id_failure() {
        let h = harness();
        seed_subscription(&h, SubscriptionStatus::Incomplete, None).await;

        let event = parsed(
            "invoice.payment_succeeded",
            Some(1700000000),
            json!({ "id": "in_x", "object": "invoice" }),
        );
        let outcome = h.engine.process(&event).await;

        assert!(!outcome.succeeded);
        assert!(outcome
            .error_message
            .unwrap()
            .contains("subscription_id"));
    }

    // ══════════════════════════════════════════════════════════════
    // Refund Transitions
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn refund_updated_applies_provider_status() {
        let h = harness();
        let mut record = RefundRecord::pending(user(), "biz_ref_1", "biz_pay_1");
        record.refund_id = Some("re_1".to_string());
        h.refunds.save(&record).await.unwrap();

        let event = parsed(
            "refund.updated",
            Some(1700000000),
            json!({ "id": "re_1", "object": "refund", "status": "succeeded" }),
        );
        let outcome = h.engine.process(&event).await;

        assert!(outcome.succeeded);
        let record = h.refunds.get_by_provider_id("re_1").await.unwrap().unwrap();
        assert_eq!(record.status, RefundStatus::Succeeded);
    }

    #[tokio::test]
    async fn refund_failed_forces_failed_status() {
        let h = harness();
        let mut record = RefundRecord::pending(user(), "biz_ref_1", "biz_pay_1");
        record.refund_id = Some("re_1".to_string());
        h.refunds.save(&record).await.unwrap();

        let event = parsed(
            "refund.failed",
            Some(1700000000),
            json!({ "id": "re_1", "object": "refund", "status": "failed" }),
        );
        h.engine.process(&event).await;

        let record = h.refunds.get_by_provider_id("re_1").await.unwrap().unwrap();
        assert_eq!(record.status, RefundStatus::Failed);
    }

    #[tokio::test]
    async fn refund_unknown_record_is_failure() {
        let h = harness();

        let event = parsed(
            "refund.created",
            Some(1700000000),
            json!({ "id": "re_404", "object": "refund", "status": "pending" }),
        );
        let outcome = h.engine.process(&event).await;

        assert!(!outcome.succeeded);
        assert!(outcome.error_message.unwrap().contains("re_404"));
    }

    // ══════════════════════════════════════════════════════════════
    // Module Flags & Unsupported Types
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn disabled_payments_module_turns_events_into_noop_success() {
        let h = harness();
        seed_payment(&h, PaymentStatus::Pending, None).await;
        let engine = ConvergenceEngine::new(
            h.payments.clone(),
            h.subscriptions.clone(),
            h.refunds.clone(),
            Arc::new(TableLookup::empty()),
        )
        .with_modules(ModuleFlags {
            payments: false,
            ..ModuleFlags::default()
        });

        let outcome = engine
            .process(&pi_event("payment_intent.succeeded", Some(1700000000)))
            .await;

        assert!(outcome.succeeded);
        let record = h.payments.get_by_provider_id("pi_1").await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn unsupported_event_type_is_noop_success() {
        let h = harness();

        let event = parsed("charge.captured", Some(1700000000), json!({ "id": "ch_1" }));
        let outcome = h.engine.process(&event).await;

        assert!(outcome.succeeded);
    }

    // ══════════════════════════════════════════════════════════════
    // Admission Predicate
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn admit_rejects_terminal_conflict() {
        assert!(!admit(2, true, 1, None, None));
    }

    #[test]
    fn admit_rejects_older_incoming_event() {
        assert!(!admit(0, false, 2, Some(200), Some(100)));
    }

    #[test]
    fn admit_equal_timestamp_ties_break_by_precedence() {
        assert!(admit(1, false, 2, Some(100), Some(100)));
        assert!(admit(1, false, 1, Some(100), Some(100)));
        assert!(!admit(2, false, 1, Some(100), Some(100)));
    }

    #[test]
    fn admit_accepts_when_either_timestamp_missing() {
        assert!(admit(2, false, 0, None, Some(100)));
        assert!(admit(2, false, 0, Some(100), None));
    }
}
