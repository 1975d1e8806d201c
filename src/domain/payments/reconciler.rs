//! Reconciliation driver.
//!
//! Webhook delivery is best-effort: deliveries get dropped, delayed, or
//! arrive while the endpoint is down. The reconciler closes those gaps by
//! paging the provider's recent events (filtered to the supported types)
//! and feeding each one through the same claim/process/record pipeline as
//! live ingestion. The shared dedupe store makes replays of
//! already-applied events harmless.
//!
//! One reconciliation pass runs at a time per deployment; paging across
//! passes is caller-driven via `starting_after_event_id`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::pipeline::{IngestOutcome, WebhookPipeline};
use super::stripe_event::EventKind;
use crate::domain::foundation::DomainError;
use crate::ports::{EventFeed, EventListRequest};

/// Default page size, also the provider-imposed maximum.
pub const DEFAULT_LIMIT: u32 = 100;

/// Default look-back window.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Parameters for one reconciliation pass.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileRequest {
    /// Page size; clamped to 1..=100. Defaults to 100.
    pub limit: Option<u32>,

    /// Only replay events created after this instant.
    /// Defaults to 30 days before the pass starts.
    pub created_after: Option<DateTime<Utc>>,

    /// Resume the provider-side cursor after this event id.
    pub starting_after_event_id: Option<String>,
}

/// Counters and paging state from one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    /// Events returned by the provider for this page.
    pub total: u32,
    /// Events this pass claimed and applied successfully.
    pub processed: u32,
    /// Events answered from the dedupe store without re-applying.
    pub duplicates: u32,
    /// Events that claimed but failed to apply.
    pub failed: u32,
    /// Id of the last event examined, for cursor-driven resumption.
    pub last_event_id: Option<String>,
    /// Whether the provider holds more events past this page.
    pub has_more: bool,
}

/// Replays recent provider events through the ingestion pipeline.
pub struct Reconciler {
    feed: Arc<dyn EventFeed>,
    pipeline: Arc<WebhookPipeline>,
}

impl Reconciler {
    pub fn new(feed: Arc<dyn EventFeed>, pipeline: Arc<WebhookPipeline>) -> Self {
        Self { feed, pipeline }
    }

    /// Runs one reconciliation pass.
    ///
    /// Checks the cancellation signal between events; when it fires, the
    /// pass stops after the event in flight and reports `has_more = true`
    /// so the caller can resume from `last_event_id`.
    pub async fn reconcile(
        &self,
        request: ReconcileRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<ReconciliationResult, DomainError> {
        let limit = request.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 100);
        let created_after = request
            .created_after
            .unwrap_or_else(|| Utc::now() - Duration::days(DEFAULT_WINDOW_DAYS));

        let page = self
            .feed
            .list_events(&EventListRequest {
                limit,
                created_after,
                starting_after: request.starting_after_event_id.clone(),
                types: EventKind::supported_types()
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            })
            .await?;

        let mut result = ReconciliationResult {
            total: page.events.len() as u32,
            processed: 0,
            duplicates: 0,
            failed: 0,
            last_event_id: None,
            has_more: page.has_more,
        };

        for event in &page.events {
            if *cancel.borrow() {
                tracing::info!(
                    last_event_id = result.last_event_id.as_deref(),
                    "reconciliation canceled"
                );
                result.has_more = true;
                break;
            }

            match self.pipeline.ingest_event(event).await {
                Ok(IngestOutcome::Applied { outcome }) if outcome.succeeded => {
                    result.processed += 1;
                }
                Ok(IngestOutcome::Applied { .. }) => {
                    result.failed += 1;
                }
                Ok(IngestOutcome::Duplicate { .. })
                | Ok(IngestOutcome::NonTerminalDuplicate { .. }) => {
                    result.duplicates += 1;
                }
                Err(err) => {
                    tracing::warn!(event_id = %event.id, error = %err, "reconcile ingest failed");
                    result.failed += 1;
                }
            }

            result.last_event_id = Some(event.id.clone());
        }

        tracing::info!(
            total = result.total,
            processed = result.processed,
            duplicates = result.duplicates,
            failed = result.failed,
            last_event_id = result.last_event_id.as_deref(),
            has_more = result.has_more,
            "reconciliation pass finished"
        );

        Ok(result)
    }
}
