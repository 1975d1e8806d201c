//! HTTP adapter for the payment hardening endpoints.
//!
//! - `POST /webhooks/stripe` - Webhook ingestion (raw body, signature
//!   verified)
//! - `POST /reconcile` - Replay recent provider events
//! - `POST /refunds` - Stage a refund for a settled payment

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{create_refund, handle_stripe_webhook, reconcile, PaymentsAppState};
pub use routes::payments_router;
