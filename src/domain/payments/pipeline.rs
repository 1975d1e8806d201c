//! Webhook ingestion pipeline.
//!
//! Orchestrates one delivery end to end: verify the signature against the
//! raw body, claim the event id in the dedupe store, parse, converge, and
//! record the outcome. The claim is the only gate between concurrent
//! deliveries of the same event: exactly one claims it, everyone else
//! branches on the recorded outcome.
//!
//! Signature and payload failures happen before the claim and leave no
//! trace in the dedupe store; the provider sees a 4xx and gives up.
//! Processing failures are recorded as failed outcomes so redelivery can
//! retry them.

use std::sync::Arc;

use super::convergence::ConvergenceEngine;
use super::parser::ParsedEvent;
use super::stripe_event::StripeEvent;
use super::webhook_errors::WebhookError;
use super::webhook_verifier::WebhookVerifier;
use crate::ports::{WebhookEventOutcome, WebhookEventStore};

/// Result of feeding one delivery through the pipeline.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// This delivery claimed the event and ran it; `outcome.succeeded`
    /// tells whether the apply worked.
    Applied { outcome: WebhookEventOutcome },

    /// Terminal duplicate: a previous delivery already succeeded. The
    /// recorded outcome is answered without re-applying anything.
    Duplicate { outcome: WebhookEventOutcome },

    /// Non-terminal duplicate: the event is either mid-flight under a live
    /// lease (`None`) or its last attempt failed and has not been
    /// reclaimed yet (`Some(failed)`). The caller should ask for a retry.
    NonTerminalDuplicate { outcome: Option<WebhookEventOutcome> },
}

impl IngestOutcome {
    /// True when this delivery performed (or no-op acknowledged) the apply.
    pub fn applied_successfully(&self) -> bool {
        matches!(self, IngestOutcome::Applied { outcome } if outcome.succeeded)
    }

    /// True for the terminal-duplicate replay branch.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestOutcome::Duplicate { .. })
    }
}

/// Verifies, dedupes, and converges webhook deliveries.
pub struct WebhookPipeline {
    verifier: WebhookVerifier,
    dedupe: Arc<dyn WebhookEventStore>,
    engine: ConvergenceEngine,
    require_livemode: bool,
}

impl WebhookPipeline {
    pub fn new(
        verifier: WebhookVerifier,
        dedupe: Arc<dyn WebhookEventStore>,
        engine: ConvergenceEngine,
    ) -> Self {
        Self {
            verifier,
            dedupe,
            engine,
            require_livemode: false,
        }
    }

    /// Rejects test-mode events before the claim.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }

    /// Ingests a raw webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures before the event id is claimed:
    /// signature, payload, and livemode rejections, plus dedupe-store I/O
    /// failures. Everything after the claim is folded into the recorded
    /// outcome.
    pub async fn ingest(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<IngestOutcome, WebhookError> {
        let header = self.verifier.verify_and_parse(payload, signature_header)?;

        if self.require_livemode && !header.livemode {
            return Err(WebhookError::LivemodeRequired);
        }

        let parsed = ParsedEvent::from_raw_body(payload);
        self.run_claimed(&header.id, &header.event_type, parsed).await
    }

    /// Ingests an event fetched from the provider's list API.
    ///
    /// Reconciliation entry point: the listing is source-authenticated, so
    /// no signature verification happens, but dedupe and convergence are
    /// shared with live ingestion. Replaying an already-succeeded event is
    /// observed as a duplicate and applies nothing.
    pub async fn ingest_event(&self, event: &StripeEvent) -> Result<IngestOutcome, WebhookError> {
        let parsed = ParsedEvent::from_event(event);
        self.run_claimed(&event.id, &event.event_type, Ok(parsed)).await
    }

    async fn run_claimed(
        &self,
        event_id: &str,
        event_type: &str,
        parsed: Result<ParsedEvent, WebhookError>,
    ) -> Result<IngestOutcome, WebhookError> {
        let started = self
            .dedupe
            .try_begin(event_id)
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;

        if !started {
            let existing = self
                .dedupe
                .get_outcome(event_id)
                .await
                .map_err(|e| WebhookError::Store(e.to_string()))?;

            return Ok(match existing {
                Some(outcome) if outcome.succeeded => {
                    tracing::info!(event_id, event_type, duplicate = true, "terminal duplicate");
                    IngestOutcome::Duplicate { outcome }
                }
                other => {
                    tracing::info!(
                        event_id,
                        event_type,
                        duplicate = true,
                        in_flight = other.is_none(),
                        "non-terminal duplicate"
                    );
                    IngestOutcome::NonTerminalDuplicate { outcome: other }
                }
            });
        }

        let outcome = match parsed {
            Ok(parsed) => {
                tracing::info!(
                    event_id,
                    event_type,
                    payment_intent_id = parsed.payment_intent_id.as_deref(),
                    subscription_id = parsed.subscription_id.as_deref(),
                    refund_id = parsed.refund_id.as_deref(),
                    customer_id = parsed.customer_id.as_deref(),
                    business_payment_id = parsed.business_payment_id.as_deref(),
                    business_subscription_id = parsed.business_subscription_id.as_deref(),
                    "processing event"
                );
                self.engine.process(&parsed).await
            }
            // The envelope verified but would not decode; record the
            // failure so redelivery can retry once the payload is fixed.
            Err(err) => WebhookEventOutcome::failure(format!("{}: {}", event_id, err)),
        };

        self.dedupe
            .record_outcome(event_id, outcome.clone())
            .await
            .map_err(|e| WebhookError::Store(e.to_string()))?;

        Ok(IngestOutcome::Applied { outcome })
    }
}
