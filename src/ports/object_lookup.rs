//! ObjectLookup port - Thin-event linkage resolution.
//!
//! Some deliveries omit the linkage the engine needs (an invoice without
//! its `subscription`, an event wrapping a bare object). This port resolves
//! the missing provider id from whatever object id the payload did carry,
//! using read-only provider fetches.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

/// Port for resolving linked provider ids from a raw object id.
///
/// Implementations dispatch on the id prefix: `pi_`/`sub_` ids are already
/// the answer, `in_` ids require fetching the invoice, `evt_` ids require
/// fetching the event and inspecting its embedded object. `None` means the
/// linkage genuinely does not exist.
#[async_trait]
pub trait ObjectLookup: Send + Sync {
    /// Resolves a payment-intent id from an object id.
    async fn get_payment_intent_id(
        &self,
        object_id: &str,
    ) -> Result<Option<String>, DomainError>;

    /// Resolves a subscription id from an object id.
    async fn get_subscription_id(&self, object_id: &str) -> Result<Option<String>, DomainError>;
}
