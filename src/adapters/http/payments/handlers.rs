//! HTTP handlers for the payment hardening endpoints.
//!
//! The webhook handler reads the body as raw bytes and hands them to the
//! pipeline untouched; any re-serialization here would break signature
//! verification.

use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tokio::sync::watch;

use crate::adapters::memory::{
    InMemoryPaymentStore, InMemoryRefundStore, InMemorySubscriptionStore,
    InMemoryWebhookEventStore,
};
use crate::adapters::stripe::{StripeApiConfig, StripeClient, StripeObjectLookup};
use crate::application::handlers::payments::{
    CreateRefundCommand, CreateRefundHandler, ReconcileEventsHandler,
};
use crate::config::AppConfig;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::payments::{
    ConvergenceEngine, IngestOutcome, ReconcileRequest, Reconciler, WebhookPipeline,
    WebhookVerifier,
};
use crate::ports::{PaymentRecordStore, RefundGateway, RefundRecordStore};

use super::dto::{CreateRefundRequest, CreateRefundResponse, ErrorResponse, WebhookResponse};

// ════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════

/// Shared state for the payment endpoints.
///
/// Cloned per request; dependencies are Arc-wrapped ports and engines.
#[derive(Clone)]
pub struct PaymentsAppState {
    pub pipeline: Arc<WebhookPipeline>,
    pub reconciler: Arc<Reconciler>,
    pub payment_store: Arc<dyn PaymentRecordStore>,
    pub refund_store: Arc<dyn RefundRecordStore>,
    pub refund_gateway: Arc<dyn RefundGateway>,
    /// Deployment shutdown signal, checked between reconciled events.
    pub shutdown: watch::Receiver<bool>,
}

impl PaymentsAppState {
    /// Wires the full stack over the in-memory stores.
    ///
    /// Suitable for single-instance deployments and tests; multi-instance
    /// deployments swap in the PostgreSQL dedupe store behind the same
    /// ports.
    pub fn in_memory(config: &AppConfig, shutdown: watch::Receiver<bool>) -> Self {
        let payments: Arc<InMemoryPaymentStore> = Arc::new(InMemoryPaymentStore::new());
        let subscriptions = Arc::new(InMemorySubscriptionStore::new());
        let refunds: Arc<InMemoryRefundStore> = Arc::new(InMemoryRefundStore::new());
        let dedupe = Arc::new(InMemoryWebhookEventStore::with_lease(
            chrono::Duration::seconds(config.payment.processing_lease_secs),
        ));

        let mut api_config = StripeApiConfig::new(config.payment.stripe_api_key.clone());
        if let Some(base_url) = &config.payment.stripe_api_base_url {
            api_config = api_config.with_base_url(base_url.clone());
        }
        let client = Arc::new(StripeClient::new(api_config));

        let engine = ConvergenceEngine::new(
            payments.clone(),
            subscriptions,
            refunds.clone(),
            Arc::new(StripeObjectLookup::new(client.clone())),
        )
        .with_modules(config.features.module_flags());

        let verifier = WebhookVerifier::new(config.payment.stripe_webhook_secret.clone())
            .with_tolerance_secs(config.payment.webhook_tolerance_secs);
        let pipeline = Arc::new(
            WebhookPipeline::new(verifier, dedupe, engine)
                .with_require_livemode(config.payment.require_livemode),
        );

        let reconciler = Arc::new(Reconciler::new(client.clone(), pipeline.clone()));

        Self {
            pipeline,
            reconciler,
            payment_store: payments,
            refund_store: refunds,
            refund_gateway: client,
            shutdown,
        }
    }

    pub fn create_refund_handler(&self) -> CreateRefundHandler {
        CreateRefundHandler::new(
            self.payment_store.clone(),
            self.refund_store.clone(),
            self.refund_gateway.clone(),
        )
    }

    pub fn reconcile_handler(&self) -> ReconcileEventsHandler {
        ReconcileEventsHandler::new(self.reconciler.clone(), self.shutdown.clone())
    }
}

// ════════════════════════════════════════════════════════════════════
// Webhook Endpoint
// ════════════════════════════════════════════════════════════════════

/// POST /webhooks/stripe - Ingest a webhook delivery.
pub async fn handle_stripe_webhook(
    State(state): State<PaymentsAppState>,
    headers: axum::http::HeaderMap,
    body: axum::body::Bytes,
) -> axum::response::Response {
    let signature = match headers.get("Stripe-Signature").and_then(|v| v.to_str().ok()) {
        Some(signature) => signature,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse::failed("Missing Stripe-Signature header")),
            )
                .into_response();
        }
    };

    match state.pipeline.ingest(&body, signature).await {
        Ok(IngestOutcome::Applied { outcome }) if outcome.succeeded => {
            (StatusCode::OK, Json(WebhookResponse::ok())).into_response()
        }
        Ok(IngestOutcome::Applied { outcome }) => (
            StatusCode::CONFLICT,
            Json(WebhookResponse::retry(outcome.error_message)),
        )
            .into_response(),
        Ok(IngestOutcome::Duplicate { .. }) => {
            (StatusCode::OK, Json(WebhookResponse::duplicate())).into_response()
        }
        Ok(IngestOutcome::NonTerminalDuplicate { outcome }) => (
            StatusCode::CONFLICT,
            Json(WebhookResponse::retry(
                outcome.and_then(|outcome| outcome.error_message),
            )),
        )
            .into_response(),
        Err(err) => (
            err.status_code(),
            Json(WebhookResponse::failed(err.to_string())),
        )
            .into_response(),
    }
}

// ════════════════════════════════════════════════════════════════════
// Reconciliation Endpoint
// ════════════════════════════════════════════════════════════════════

/// POST /reconcile - Run one reconciliation pass.
pub async fn reconcile(
    State(state): State<PaymentsAppState>,
    Json(request): Json<ReconcileRequest>,
) -> Result<impl IntoResponse, PaymentsApiError> {
    let handler = state.reconcile_handler();
    let result = handler.handle(request).await?;
    Ok(Json(result))
}

// ════════════════════════════════════════════════════════════════════
// Refund Endpoint
// ════════════════════════════════════════════════════════════════════

/// POST /refunds - Stage a refund for a settled payment.
pub async fn create_refund(
    State(state): State<PaymentsAppState>,
    Json(request): Json<CreateRefundRequest>,
) -> Result<impl IntoResponse, PaymentsApiError> {
    let user_id = UserId::new(request.user_id).map_err(DomainError::from)?;

    let handler = state.create_refund_handler();
    let cmd = CreateRefundCommand {
        user_id,
        business_refund_id: request.business_refund_id,
        business_payment_id: request.business_payment_id,
        idempotency_key: request.idempotency_key,
    };

    let result = handler.handle(cmd).await?;

    Ok(Json(CreateRefundResponse {
        refund_id: result.refund_id,
        status: result.status,
    }))
}

// ════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════

/// API error type that converts domain errors to HTTP responses.
pub struct PaymentsApiError(DomainError);

impl From<DomainError> for PaymentsApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PaymentsApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0.code {
            ErrorCode::RecordNotFound => StatusCode::NOT_FOUND,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::InvalidStateTransition => StatusCode::CONFLICT,
            ErrorCode::ValidationFailed | ErrorCode::EmptyField | ErrorCode::InvalidFormat => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::ExternalServiceError => StatusCode::BAD_GATEWAY,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse::new(self.0.code.to_string(), self.0.message);
        (status, Json(body)).into_response()
    }
}
