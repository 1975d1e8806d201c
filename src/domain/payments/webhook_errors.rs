//! Webhook error taxonomy.
//!
//! Errors raised before an event id is claimed (signature and payload
//! failures) terminate the request and never touch the dedupe store.
//! Errors raised while applying an event are converted into failed
//! outcomes and recorded, so the provider's redelivery can retry them.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook verification and processing.
#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    /// Signature header missing the timestamp or every v1 entry, or
    /// otherwise unparseable.
    #[error("Malformed signature header: {0}")]
    SignatureMalformed(String),

    /// Signed timestamp outside the acceptance window.
    #[error("Signature timestamp outside tolerance ({age_secs}s skew)")]
    TimestampOutOfTolerance { age_secs: i64 },

    /// No v1 signature matched the payload.
    #[error("Signature mismatch")]
    SignatureMismatch,

    /// Body is not JSON or lacks the required event fields.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Test-mode event delivered to a deployment requiring live traffic.
    #[error("Live mode event required")]
    LivemodeRequired,

    /// The event's target record could not be correlated to a provider id.
    #[error("Missing linked id: {0}")]
    MissingLinkedId(&'static str),

    /// No record matched the resolved provider or business id.
    #[error("Record not found for {0}")]
    RecordNotFound(String),

    /// A store or provider lookup failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl WebhookError {
    /// Returns true if the provider should retry delivering this webhook.
    ///
    /// Correlation gaps and store failures may heal on redelivery
    /// (eventual consistency, transient backend outages). Signature and
    /// payload failures never do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingLinkedId(_)
                | WebhookError::RecordNotFound(_)
                | WebhookError::Store(_)
        )
    }

    /// Returns true if the error occurred before the event id was claimed.
    ///
    /// These errors must not leave any trace in the dedupe store.
    pub fn is_pre_claim(&self) -> bool {
        matches!(
            self,
            WebhookError::SignatureMalformed(_)
                | WebhookError::TimestampOutOfTolerance { .. }
                | WebhookError::SignatureMismatch
                | WebhookError::MalformedPayload(_)
                | WebhookError::LivemodeRequired
        )
    }

    /// Maps the error to the HTTP status the webhook endpoint answers with.
    pub fn status_code(&self) -> StatusCode {
        if self.is_pre_claim() {
            StatusCode::BAD_REQUEST
        } else {
            // Recorded as a failed outcome; the provider should retry.
            StatusCode::CONFLICT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_errors_are_pre_claim_and_not_retryable() {
        let errors = [
            WebhookError::SignatureMalformed("missing t".into()),
            WebhookError::TimestampOutOfTolerance { age_secs: 400 },
            WebhookError::SignatureMismatch,
            WebhookError::MalformedPayload("not json".into()),
            WebhookError::LivemodeRequired,
        ];
        for err in errors {
            assert!(err.is_pre_claim(), "{err} should be pre-claim");
            assert!(!err.is_retryable(), "{err} should not be retryable");
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn processing_errors_are_retryable_conflicts() {
        let errors = [
            WebhookError::MissingLinkedId("payment_intent_id"),
            WebhookError::RecordNotFound("pi_404".into()),
            WebhookError::Store("connection reset".into()),
        ];
        for err in errors {
            assert!(!err.is_pre_claim(), "{err} should not be pre-claim");
            assert!(err.is_retryable(), "{err} should be retryable");
            assert_eq!(err.status_code(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn timestamp_error_displays_skew() {
        let err = WebhookError::TimestampOutOfTolerance { age_secs: 301 };
        assert!(err.to_string().contains("301"));
    }
}
