//! Stripe API client.
//!
//! Thin `reqwest` wrapper over the provider operations the engine needs:
//! read-only object fetches for thin-event resolution, the event listing
//! that feeds reconciliation, and refund creation. Authentication is
//! basic-auth with the secret key; the key never leaves the
//! `SecretString` except at the request boundary.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::foundation::DomainError;
use crate::domain::payments::StripeEvent;
use crate::ports::{EventFeed, EventListRequest, EventPage, ProviderRefund, RefundGateway};

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeApiConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for the Stripe API.
    api_base_url: String,
}

impl StripeApiConfig {
    /// Creates a configuration for the public Stripe API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Reads `STRIPE_API_KEY` (and optionally `STRIPE_API_BASE_URL`).
    pub fn from_env() -> Result<Self, std::env::VarError> {
        let api_key = std::env::var("STRIPE_API_KEY")?;
        let api_base_url = std::env::var("STRIPE_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.stripe.com".to_string());
        Ok(Self {
            api_key: SecretString::new(api_key),
            api_base_url,
        })
    }

    /// Points the client at a different base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }
}

/// Invoice as returned by `GET /v1/invoices/{id}`.
///
/// Only the linkage fields the engine reads; expandable references arrive
/// as bare ids when not expanded.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    /// Unique invoice identifier (in_...).
    pub id: String,

    /// Payment intent settling this invoice.
    pub payment_intent: Option<String>,

    /// Subscription the invoice bills.
    pub subscription: Option<String>,
}

/// Event listing page as returned by `GET /v1/events`.
#[derive(Debug, Clone, Deserialize)]
struct StripeEventList {
    data: Vec<StripeEvent>,
    #[serde(default)]
    has_more: bool,
}

/// Refund as returned by `POST /v1/refunds`.
#[derive(Debug, Clone, Deserialize)]
struct StripeRefund {
    id: String,
    status: String,
}

/// Client for the Stripe API operations the engine uses.
pub struct StripeClient {
    config: StripeApiConfig,
    http_client: reqwest::Client,
}

impl StripeClient {
    pub fn new(config: StripeApiConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Fetches an event by id; `None` when Stripe no longer holds it.
    pub async fn fetch_event(&self, event_id: &str) -> Result<Option<StripeEvent>, DomainError> {
        let url = format!("{}/v1/events/{}", self.config.api_base_url, event_id);
        self.get_optional(&url).await
    }

    /// Fetches an invoice by id; `None` on 404.
    pub async fn fetch_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<Option<StripeInvoice>, DomainError> {
        let url = format!("{}/v1/invoices/{}", self.config.api_base_url, invoice_id);
        self.get_optional(&url).await
    }

    async fn get_optional<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, DomainError> {
        let response = self
            .http_client
            .get(url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, url, "Stripe fetch failed");
            return Err(DomainError::external(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let parsed = response
            .json()
            .await
            .map_err(|e| DomainError::external(format!("Failed to parse Stripe response: {}", e)))?;
        Ok(Some(parsed))
    }
}

#[async_trait]
impl EventFeed for StripeClient {
    async fn list_events(&self, request: &EventListRequest) -> Result<EventPage, DomainError> {
        let url = format!("{}/v1/events", self.config.api_base_url);

        let mut query: Vec<(String, String)> = vec![
            ("limit".to_string(), request.limit.to_string()),
            (
                "created[gt]".to_string(),
                request.created_after.timestamp().to_string(),
            ),
        ];
        for event_type in &request.types {
            query.push(("types[]".to_string(), event_type.clone()));
        }
        if let Some(cursor) = &request.starting_after {
            query.push(("starting_after".to_string(), cursor.clone()));
        }

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(&query)
            .send()
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, "Stripe list_events failed");
            return Err(DomainError::external(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let list: StripeEventList = response
            .json()
            .await
            .map_err(|e| DomainError::external(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(EventPage {
            events: list.data,
            has_more: list.has_more,
        })
    }
}

#[async_trait]
impl RefundGateway for StripeClient {
    async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: &str,
    ) -> Result<ProviderRefund, DomainError> {
        let url = format!("{}/v1/refunds", self.config.api_base_url);
        let params = [("payment_intent", payment_intent_id)];

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .header("Idempotency-Key", idempotency_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| DomainError::external(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(error = %error_text, payment_intent_id, "Stripe create_refund failed");
            return Err(DomainError::external(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let refund: StripeRefund = response
            .json()
            .await
            .map_err(|e| DomainError::external(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(ProviderRefund {
            id: refund.id,
            status: refund.status,
        })
    }
}
