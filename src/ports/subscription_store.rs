//! SubscriptionRecordStore port - Persistence for subscription records.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payments::SubscriptionRecord;

/// Port for storing subscription records with bidirectional lookup.
///
/// Same index discipline as the payment store: the
/// `subscription_id -> business_subscription_id` mapping is updated
/// atomically with the record write. Empty-string ids are rejected.
#[async_trait]
pub trait SubscriptionRecordStore: Send + Sync {
    /// Upserts the record, keyed by `business_subscription_id`.
    async fn save(&self, record: &SubscriptionRecord) -> Result<(), DomainError>;

    /// Looks up by the merchant's business id.
    async fn get_by_business_id(
        &self,
        business_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;

    /// Looks up via the provider-id secondary index.
    async fn get_by_provider_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError>;
}
