//! Normalized event view extraction.
//!
//! Both ingestion paths produce the same `ParsedEvent`: webhooks from the
//! raw request body, reconciliation from events returned by the provider's
//! list API. Extraction walks `data.object` and tolerates Stripe's
//! expandable fields, which arrive either as a bare id string or as a
//! nested object carrying an `id`.

use serde_json::Value;

use super::stripe_event::{EventKind, StripeEvent};
use super::webhook_errors::WebhookError;

/// Kind of the object embedded in `data.object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    PaymentIntent,
    Invoice,
    Subscription,
    Refund,
    CheckoutSession,
    Unknown,
}

impl ObjectKind {
    fn from_object_field(s: &str) -> Self {
        match s {
            "payment_intent" => Self::PaymentIntent,
            "invoice" => Self::Invoice,
            "subscription" => Self::Subscription,
            "refund" => Self::Refund,
            "checkout.session" => Self::CheckoutSession,
            _ => Self::Unknown,
        }
    }

    fn from_id_prefix(id: &str) -> Self {
        if id.starts_with("pi_") {
            Self::PaymentIntent
        } else if id.starts_with("in_") {
            Self::Invoice
        } else if id.starts_with("sub_") {
            Self::Subscription
        } else if id.starts_with("re_") || id.starts_with("pyr_") {
            Self::Refund
        } else if id.starts_with("cs_") {
            Self::CheckoutSession
        } else {
            Self::Unknown
        }
    }
}

/// Normalized view of a provider event.
///
/// Linked ids and business-id metadata are extracted opportunistically;
/// absent linkage is resolved later by the object lookup (thin events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    /// Provider event id.
    pub id: String,
    /// Raw event type string.
    pub event_type: String,
    /// Dispatch vocabulary entry for the event type.
    pub kind: EventKind,
    /// Provider creation time, unix seconds.
    pub created_at: Option<i64>,
    /// Id of the embedded object.
    pub object_id: Option<String>,
    /// Kind of the embedded object.
    pub object_kind: ObjectKind,
    /// Status carried on the embedded object.
    pub object_status: Option<String>,
    /// Linked payment intent id.
    pub payment_intent_id: Option<String>,
    /// Linked subscription id.
    pub subscription_id: Option<String>,
    /// Linked refund id.
    pub refund_id: Option<String>,
    /// Linked customer id.
    pub customer_id: Option<String>,
    /// Merchant payment id recovered from metadata or the checkout session.
    pub business_payment_id: Option<String>,
    /// Merchant subscription id recovered from metadata or the checkout session.
    pub business_subscription_id: Option<String>,
}

impl ParsedEvent {
    /// Parses the raw webhook body.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MalformedPayload` when the body is not a
    /// decodable event envelope.
    pub fn from_raw_body(payload: &[u8]) -> Result<Self, WebhookError> {
        let event: StripeEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::MalformedPayload(e.to_string()))?;
        Ok(Self::from_event(&event))
    }

    /// Produces the normalized view from a typed event envelope.
    pub fn from_event(event: &StripeEvent) -> Self {
        let object = &event.data.object;

        let object_id = string_field(object, "id");
        let object_kind = string_field(object, "object")
            .map(|s| ObjectKind::from_object_field(&s))
            .or_else(|| object_id.as_deref().map(ObjectKind::from_id_prefix))
            .unwrap_or(ObjectKind::Unknown);

        let mut payment_intent_id = linked_id(object, "payment_intent");
        let mut subscription_id = linked_id(object, "subscription");
        let customer_id = linked_id(object, "customer");

        // The object's own id doubles as the linked id for its kind.
        match object_kind {
            ObjectKind::PaymentIntent => {
                payment_intent_id = payment_intent_id.or_else(|| object_id.clone());
            }
            ObjectKind::Subscription => {
                subscription_id = subscription_id.or_else(|| object_id.clone());
            }
            _ => {}
        }

        let refund_id = match object_kind {
            ObjectKind::Refund => object_id.clone(),
            _ => linked_id(object, "refund"),
        };

        let mut business_payment_id = metadata_field(object, "business_payment_id");
        let mut business_subscription_id = metadata_field(object, "business_subscription_id");

        if object_kind == ObjectKind::CheckoutSession {
            let client_reference = string_field(object, "client_reference_id");
            match string_field(object, "mode").as_deref() {
                Some("payment") => {
                    business_payment_id = client_reference.or(business_payment_id);
                }
                Some("subscription") => {
                    business_subscription_id = client_reference.or(business_subscription_id);
                }
                _ => {}
            }
        }

        Self {
            id: event.id.clone(),
            event_type: event.event_type.clone(),
            kind: event.kind(),
            created_at: event.created,
            object_id,
            object_kind,
            object_status: string_field(object, "status"),
            payment_intent_id,
            subscription_id,
            refund_id,
            customer_id,
            business_payment_id,
            business_subscription_id,
        }
    }
}

/// Reads a plain string field off an object.
fn string_field(object: &Value, key: &str) -> Option<String> {
    object.get(key)?.as_str().map(str::to_string)
}

/// Reads an expandable reference: either `"pi_x"` or `{"id": "pi_x", ...}`.
fn linked_id(object: &Value, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("id")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// Reads a string out of the object's metadata map.
fn metadata_field(object: &Value, key: &str) -> Option<String> {
    object.get("metadata")?.get(key)?.as_str().map(str::to_string)
}
