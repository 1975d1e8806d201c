//! WebhookEventStore port - Idempotency tracking for event deliveries.
//!
//! The provider delivers every event at least once; this store makes the
//! pipeline apply each event at most once on success while keeping failed
//! attempts retriable.
//!
//! ## State machine per event id
//!
//! ```text
//!   (none) --try_begin--> Processing
//!     Processing --record_outcome(succeeded)--> Succeeded   [terminal]
//!     Processing --record_outcome(failed)----> Failed
//!     Failed --try_begin--> Processing
//!     Processing --try_begin (lease expired)--> Processing (fresh lease)
//!     Succeeded --try_begin--> false, state unchanged
//! ```
//!
//! A `Processing` entry holds a time-bounded lease: if the claiming handler
//! dies before recording an outcome, the lease expires and a later delivery
//! takes over.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::foundation::DomainError;

/// Default processing lease, seconds (5 minutes).
pub const DEFAULT_LEASE_SECS: i64 = 300;

/// Default processing lease as a duration.
pub fn default_lease() -> Duration {
    Duration::seconds(DEFAULT_LEASE_SECS)
}

/// Processing state of an event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    /// Claimed by a handler; lease running.
    Processing,
    /// Applied successfully. Never re-opened.
    Succeeded,
    /// Last attempt failed; a redelivery may reclaim it.
    Failed,
}

/// Outcome recorded when processing finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEventOutcome {
    /// Whether the event applied (or was an acknowledged no-op).
    pub succeeded: bool,
    /// Failure detail, absent on success.
    pub error_message: Option<String>,
    /// When the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl WebhookEventOutcome {
    /// Creates a success outcome.
    pub fn success() -> Self {
        Self {
            succeeded: true,
            error_message: None,
            recorded_at: Utc::now(),
        }
    }

    /// Creates a failure outcome carrying the error detail.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error_message: Some(error.into()),
            recorded_at: Utc::now(),
        }
    }
}

/// Stored entry for one event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEventEntry {
    /// Provider event id (evt_xxx).
    pub event_id: String,
    /// Current state.
    pub state: EventState,
    /// When the current lease was taken.
    pub started_at: DateTime<Utc>,
    /// Recorded outcome; absent while Processing.
    pub outcome: Option<WebhookEventOutcome>,
}

/// Port for the per-event-id dedupe state machine.
///
/// All three operations must be serializable against each other for the
/// same event id: persistent backends use a uniqueness constraint on
/// `event_id` plus guarded updates, memory backends a per-map critical
/// section. That atomicity is the sole property protecting records from
/// duplicate application.
#[async_trait]
pub trait WebhookEventStore: Send + Sync {
    /// Atomically claims the event id for processing.
    ///
    /// Returns `true` iff the entry was absent, in `Failed`, or in
    /// `Processing` with an expired lease; in those cases the entry is
    /// (re)written to `Processing` with a fresh `started_at`. A
    /// `Succeeded` entry is never reclaimed.
    async fn try_begin(&self, event_id: &str) -> Result<bool, DomainError>;

    /// Records the outcome for a claimed event id.
    ///
    /// Writes `Succeeded` or `Failed` per `outcome.succeeded`, preserving
    /// the existing `started_at`.
    async fn record_outcome(
        &self,
        event_id: &str,
        outcome: WebhookEventOutcome,
    ) -> Result<(), DomainError>;

    /// Returns the last recorded outcome, or `None` for unknown ids and
    /// entries still in `Processing`.
    async fn get_outcome(&self, event_id: &str)
        -> Result<Option<WebhookEventOutcome>, DomainError>;

    /// Deletes terminal entries recorded before the cutoff.
    ///
    /// Retention housekeeping; returns the number of entries removed.
    /// `Processing` entries are never removed.
    async fn delete_recorded_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;
}
