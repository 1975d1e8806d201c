//! RefundRecordStore port - Persistence for refund records.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payments::RefundRecord;

/// Port for storing refund records with bidirectional lookup.
///
/// The `refund_id -> business_refund_id` mapping is updated atomically
/// with the record write. Empty-string ids are rejected.
#[async_trait]
pub trait RefundRecordStore: Send + Sync {
    /// Upserts the record, keyed by `business_refund_id`.
    async fn save(&self, record: &RefundRecord) -> Result<(), DomainError>;

    /// Looks up by the merchant's business id.
    async fn get_by_business_id(
        &self,
        business_refund_id: &str,
    ) -> Result<Option<RefundRecord>, DomainError>;

    /// Looks up via the provider-id secondary index.
    async fn get_by_provider_id(
        &self,
        refund_id: &str,
    ) -> Result<Option<RefundRecord>, DomainError>;
}
