//! Axum router configuration for the payment hardening endpoints.

use axum::{routing::post, Router};

use super::handlers::{create_refund, handle_stripe_webhook, reconcile, PaymentsAppState};

/// Create the payment hardening router.
///
/// # Routes
///
/// - `POST /webhooks/stripe` - Webhook ingestion (signature verified, no
///   user auth)
/// - `POST /reconcile` - Run one reconciliation pass
/// - `POST /refunds` - Stage a refund for a settled payment
pub fn payments_router() -> Router<PaymentsAppState> {
    Router::new()
        .route("/webhooks/stripe", post(handle_stripe_webhook))
        .route("/reconcile", post(reconcile))
        .route("/refunds", post(create_refund))
}
