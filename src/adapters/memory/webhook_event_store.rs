//! In-memory implementation of the webhook event dedupe store.
//!
//! Reference implementation for tests and single-instance deployments.
//! A single `RwLock` write guard is the critical section making
//! `try_begin` / `record_outcome` / `get_outcome` serializable, which is
//! what persistent backends achieve with a uniqueness constraint on
//! `event_id` plus guarded updates.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::ports::{
    default_lease, EventState, WebhookEventEntry, WebhookEventOutcome, WebhookEventStore,
};

/// In-memory dedupe store with a configurable processing lease.
pub struct InMemoryWebhookEventStore {
    entries: RwLock<HashMap<String, WebhookEventEntry>>,
    lease: Duration,
}

impl InMemoryWebhookEventStore {
    /// Creates a store with the default 5-minute lease.
    pub fn new() -> Self {
        Self::with_lease(default_lease())
    }

    /// Creates a store with a custom lease.
    pub fn with_lease(lease: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            lease,
        }
    }

    /// Returns the full entry for inspection.
    pub async fn get_entry(&self, event_id: &str) -> Option<WebhookEventEntry> {
        self.entries.read().await.get(event_id).cloned()
    }
}

impl Default for InMemoryWebhookEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookEventStore for InMemoryWebhookEventStore {
    async fn try_begin(&self, event_id: &str) -> Result<bool, DomainError> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();

        let claimable = match entries.get(event_id) {
            None => true,
            Some(entry) => match entry.state {
                EventState::Succeeded => false,
                EventState::Failed => true,
                EventState::Processing => now - entry.started_at >= self.lease,
            },
        };

        if claimable {
            entries.insert(
                event_id.to_string(),
                WebhookEventEntry {
                    event_id: event_id.to_string(),
                    state: EventState::Processing,
                    started_at: now,
                    outcome: None,
                },
            );
        }

        Ok(claimable)
    }

    async fn record_outcome(
        &self,
        event_id: &str,
        outcome: WebhookEventOutcome,
    ) -> Result<(), DomainError> {
        let mut entries = self.entries.write().await;
        let started_at = entries
            .get(event_id)
            .map(|entry| entry.started_at)
            .unwrap_or_else(Utc::now);

        entries.insert(
            event_id.to_string(),
            WebhookEventEntry {
                event_id: event_id.to_string(),
                state: if outcome.succeeded {
                    EventState::Succeeded
                } else {
                    EventState::Failed
                },
                started_at,
                outcome: Some(outcome),
            },
        );

        Ok(())
    }

    async fn get_outcome(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventOutcome>, DomainError> {
        let entries = self.entries.read().await;
        Ok(entries.get(event_id).and_then(|entry| match entry.state {
            EventState::Processing => None,
            _ => entry.outcome.clone(),
        }))
    }

    async fn delete_recorded_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| match (&entry.state, &entry.outcome) {
            (EventState::Processing, _) => true,
            (_, Some(outcome)) => outcome.recorded_at >= cutoff,
            (_, None) => true,
        });
        Ok((before - entries.len()) as u64)
    }
}
