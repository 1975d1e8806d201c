//! Prefix-dispatched object lookup over the Stripe client.
//!
//! Resolves the linked ids thin events omit. The id prefix decides the
//! path: `pi_` and `sub_` ids already are the answer, `in_` ids need the
//! invoice, `evt_` ids need the event so its embedded object can be
//! re-parsed. Anything else has no linkage to find.

use std::sync::Arc;

use async_trait::async_trait;

use super::client::StripeClient;
use crate::domain::foundation::DomainError;
use crate::domain::payments::ParsedEvent;
use crate::ports::ObjectLookup;

/// `ObjectLookup` implementation backed by the Stripe API.
pub struct StripeObjectLookup {
    client: Arc<StripeClient>,
}

impl StripeObjectLookup {
    pub fn new(client: Arc<StripeClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectLookup for StripeObjectLookup {
    async fn get_payment_intent_id(
        &self,
        object_id: &str,
    ) -> Result<Option<String>, DomainError> {
        if object_id.starts_with("pi_") {
            return Ok(Some(object_id.to_string()));
        }

        if object_id.starts_with("in_") {
            let invoice = self.client.fetch_invoice(object_id).await?;
            return Ok(invoice.and_then(|invoice| invoice.payment_intent));
        }

        if object_id.starts_with("evt_") {
            let event = self.client.fetch_event(object_id).await?;
            return Ok(event.and_then(|event| ParsedEvent::from_event(&event).payment_intent_id));
        }

        Ok(None)
    }

    async fn get_subscription_id(&self, object_id: &str) -> Result<Option<String>, DomainError> {
        if object_id.starts_with("sub_") {
            return Ok(Some(object_id.to_string()));
        }

        if object_id.starts_with("in_") {
            let invoice = self.client.fetch_invoice(object_id).await?;
            return Ok(invoice.and_then(|invoice| invoice.subscription));
        }

        if object_id.starts_with("evt_") {
            let event = self.client.fetch_event(object_id).await?;
            return Ok(event.and_then(|event| ParsedEvent::from_event(&event).subscription_id));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::stripe::client::StripeApiConfig;

    fn lookup() -> StripeObjectLookup {
        // Unroutable base URL: these tests only exercise the paths that
        // never reach the network.
        let config = StripeApiConfig::new("sk_test_x").with_base_url("http://127.0.0.1:0");
        StripeObjectLookup::new(Arc::new(StripeClient::new(config)))
    }

    #[tokio::test]
    async fn payment_intent_id_resolves_to_itself() {
        let resolved = lookup().get_payment_intent_id("pi_123").await.unwrap();
        assert_eq!(resolved.as_deref(), Some("pi_123"));
    }

    #[tokio::test]
    async fn subscription_id_resolves_to_itself() {
        let resolved = lookup().get_subscription_id("sub_123").await.unwrap();
        assert_eq!(resolved.as_deref(), Some("sub_123"));
    }

    #[tokio::test]
    async fn unknown_prefix_has_no_linkage() {
        assert!(lookup().get_payment_intent_id("cs_123").await.unwrap().is_none());
        assert!(lookup().get_subscription_id("ch_123").await.unwrap().is_none());
    }
}
