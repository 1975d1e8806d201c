//! Stripe webhook event envelope and the supported event-type vocabulary.
//!
//! Only fields relevant to convergence are captured; the rest of Stripe's
//! event schema is ignored on decode.

use serde::{Deserialize, Serialize};

/// Stripe webhook event (simplified).
///
/// This is the shape shared by raw webhook payloads and events returned by
/// the provider's event-list API, so both ingestion paths feed the same
/// parser.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    /// Unique identifier for the event (evt_xxx format).
    pub id: String,

    /// Type of event (e.g., "payment_intent.succeeded").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time at which the event was created (unix seconds).
    #[serde(default)]
    pub created: Option<i64>,

    /// Object containing event-specific data.
    pub data: StripeEventData,

    /// Whether this is a live mode event (vs test mode).
    #[serde(default)]
    pub livemode: bool,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// The object that triggered the event (polymorphic by event type).
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// Parse the event type into a known enum variant.
    pub fn kind(&self) -> EventKind {
        EventKind::from_type(&self.event_type)
    }
}

/// Event types the convergence engine acts on.
///
/// Keeping the vocabulary closed makes dispatch exhaustive-checkable;
/// anything outside the table is `Unsupported` and acknowledged as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Payment intent captured.
    PaymentIntentSucceeded,
    /// Payment intent attempt failed.
    PaymentIntentFailed,
    /// Invoice paid; the linked subscription becomes current.
    InvoicePaymentSucceeded,
    /// Invoice payment failed; the linked subscription falls past due.
    InvoicePaymentFailed,
    /// Subscription created.
    SubscriptionCreated,
    /// Subscription updated (status carried on the object).
    SubscriptionUpdated,
    /// Subscription deleted.
    SubscriptionDeleted,
    /// Refund created.
    RefundCreated,
    /// Refund updated (status carried on the object).
    RefundUpdated,
    /// Refund failed.
    RefundFailed,
    /// Any event type outside the supported vocabulary.
    Unsupported,
}

impl EventKind {
    /// Parse an event-type string.
    pub fn from_type(s: &str) -> Self {
        match s {
            "payment_intent.succeeded" => Self::PaymentIntentSucceeded,
            "payment_intent.payment_failed" => Self::PaymentIntentFailed,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "refund.created" => Self::RefundCreated,
            "refund.updated" => Self::RefundUpdated,
            "refund.failed" => Self::RefundFailed,
            _ => Self::Unsupported,
        }
    }

    /// Convert to the Stripe event type string.
    pub fn as_type(&self) -> &'static str {
        match self {
            Self::PaymentIntentSucceeded => "payment_intent.succeeded",
            Self::PaymentIntentFailed => "payment_intent.payment_failed",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::SubscriptionCreated => "customer.subscription.created",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
            Self::RefundCreated => "refund.created",
            Self::RefundUpdated => "refund.updated",
            Self::RefundFailed => "refund.failed",
            Self::Unsupported => "unsupported",
        }
    }

    /// Every event type the engine handles, in dispatch-table order.
    ///
    /// Used by the reconciler to filter the provider's event listing.
    pub fn supported_types() -> &'static [&'static str] {
        &[
            "payment_intent.succeeded",
            "payment_intent.payment_failed",
            "invoice.payment_succeeded",
            "invoice.payment_failed",
            "customer.subscription.created",
            "customer.subscription.updated",
            "customer.subscription.deleted",
            "refund.created",
            "refund.updated",
            "refund.failed",
        ]
    }
}
