//! Payment command handlers.

mod create_refund;
mod reconcile_events;

pub use create_refund::{CreateRefundCommand, CreateRefundHandler, CreateRefundResult};
pub use reconcile_events::ReconcileEventsHandler;
