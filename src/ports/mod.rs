//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the engine and the outside world. Adapters implement these ports.
//!
//! ## Dedupe Port
//!
//! - `WebhookEventStore` - Per-event-id claim/outcome state machine with
//!   processing leases
//!
//! ## Record Store Ports
//!
//! - `PaymentRecordStore`, `SubscriptionRecordStore`, `RefundRecordStore` -
//!   Idempotent upsert with bidirectional (business id / provider id) lookup
//!
//! ## Provider Ports
//!
//! - `ObjectLookup` - Thin-event linkage resolution via read-only fetches
//! - `EventFeed` - Paged listing of recent provider events (reconciliation)
//! - `RefundGateway` - Outbound refund creation with idempotency keys

mod event_feed;
mod object_lookup;
mod payment_store;
mod refund_gateway;
mod refund_store;
mod subscription_store;
mod webhook_event_store;

pub use event_feed::{EventFeed, EventListRequest, EventPage};
pub use object_lookup::ObjectLookup;
pub use payment_store::PaymentRecordStore;
pub use refund_gateway::{ProviderRefund, RefundGateway};
pub use refund_store::RefundRecordStore;
pub use subscription_store::SubscriptionRecordStore;
pub use webhook_event_store::{
    default_lease, EventState, WebhookEventEntry, WebhookEventOutcome, WebhookEventStore,
    DEFAULT_LEASE_SECS,
};
