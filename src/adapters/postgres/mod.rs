//! PostgreSQL adapters.

mod webhook_event_store;

pub use webhook_event_store::PostgresWebhookEventStore;
