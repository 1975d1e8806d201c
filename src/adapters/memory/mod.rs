//! In-memory reference implementations of the store ports.
//!
//! Suitable for tests and single-instance deployments. Multi-instance
//! deployments need a shared backend (see the `postgres` adapter for the
//! dedupe store).

mod record_stores;
mod webhook_event_store;

pub use record_stores::{InMemoryPaymentStore, InMemoryRefundStore, InMemorySubscriptionStore};
pub use webhook_event_store::InMemoryWebhookEventStore;
