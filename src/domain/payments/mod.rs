//! Payments domain - Webhook ingestion, idempotency, and convergence.
//!
//! The modules here form the engine that hardens provider interaction
//! against duplicate deliveries, forged payloads, and out-of-order events:
//!
//! - `idempotency_key` - Deterministic keys for outbound operations
//! - `webhook_verifier` - Raw-body signature verification
//! - `stripe_event` / `parser` - Event envelope and normalized view
//! - `convergence` - Order-aware status convergence over the record stores
//! - `pipeline` - Verify -> claim -> process -> record orchestration
//! - `reconciler` - Replay of recent provider events through the pipeline

pub mod convergence;
pub mod idempotency_key;
pub mod parser;
pub mod pipeline;
pub mod reconciler;
pub mod records;
pub mod stripe_event;
pub mod webhook_errors;
pub mod webhook_verifier;

pub use convergence::{ConvergenceEngine, ModuleFlags};
pub use parser::{ObjectKind, ParsedEvent};
pub use pipeline::{IngestOutcome, WebhookPipeline};
pub use reconciler::{ReconcileRequest, Reconciler, ReconciliationResult};
pub use records::{
    PaymentRecord, PaymentStatus, RefundRecord, RefundStatus, SubscriptionRecord,
    SubscriptionStatus,
};
pub use stripe_event::{EventKind, StripeEvent, StripeEventData};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{EventHeader, SignatureHeader, WebhookVerifier};
