//! HTTP DTOs for the payment hardening endpoints.
//!
//! These types define the JSON request/response structure at the HTTP
//! boundary. Reconciliation reuses the domain request/result types, which
//! already carry their serde derives.

use serde::{Deserialize, Serialize};

use crate::domain::payments::RefundStatus;

// ════════════════════════════════════════════════════════════════════
// Webhook Responses
// ════════════════════════════════════════════════════════════════════

/// Response body for the webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// "ok", "duplicate", "retry", or "failed".
    pub status: String,

    /// Failure detail, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    /// Applied (or acknowledged no-op) and recorded.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    /// Terminal duplicate answered from the dedupe store.
    pub fn duplicate() -> Self {
        Self {
            status: "duplicate".to_string(),
            error: None,
        }
    }

    /// Non-terminal duplicate or applied-but-failed; redeliver later.
    pub fn retry(error: Option<String>) -> Self {
        Self {
            status: "retry".to_string(),
            error,
        }
    }

    /// Rejected before processing (signature, payload, missing header).
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: "failed".to_string(),
            error: Some(error.into()),
        }
    }
}

// ════════════════════════════════════════════════════════════════════
// Refunds
// ════════════════════════════════════════════════════════════════════

/// Request to create a refund.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRefundRequest {
    /// User that owns the payment.
    pub user_id: String,
    /// Merchant id for the new refund.
    pub business_refund_id: String,
    /// Merchant id of the payment being refunded.
    pub business_payment_id: String,
    /// Optional caller-supplied idempotency key.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Response for a created refund.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRefundResponse {
    /// Provider refund id.
    pub refund_id: String,
    /// Status as acknowledged by the provider.
    pub status: RefundStatus,
}

// ════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════

/// Standard error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
