//! PaymentRecordStore port - Persistence for payment records.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payments::PaymentRecord;

/// Port for storing payment records with bidirectional lookup.
///
/// The secondary index `payment_intent_id -> business_payment_id` is
/// maintained atomically with the record write: when a save rewrites the
/// provider id, the stale mapping is removed before the new one is
/// installed, so the index never dangles.
///
/// Implementations reject empty-string ids at the API.
#[async_trait]
pub trait PaymentRecordStore: Send + Sync {
    /// Upserts the record, keyed by `business_payment_id`.
    async fn save(&self, record: &PaymentRecord) -> Result<(), DomainError>;

    /// Looks up by the merchant's business id.
    async fn get_by_business_id(
        &self,
        business_payment_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError>;

    /// Looks up via the provider-id secondary index.
    async fn get_by_provider_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError>;
}
