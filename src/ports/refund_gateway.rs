//! RefundGateway port - Outbound refund creation.
//!
//! Refund request shaping is a collaborator concern; the engine only
//! supplies the target payment intent and a deterministic idempotency key
//! so the provider deduplicates retried creations.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

/// Refund as acknowledged by the provider.
#[derive(Debug, Clone)]
pub struct ProviderRefund {
    /// Provider refund id (re_xxx).
    pub id: String,

    /// Provider status string ("pending", "succeeded", "failed").
    pub status: String,
}

/// Port for creating refunds at the provider.
#[async_trait]
pub trait RefundGateway: Send + Sync {
    /// Creates a refund for the full remaining amount of a payment intent.
    async fn create_refund(
        &self,
        payment_intent_id: &str,
        idempotency_key: &str,
    ) -> Result<ProviderRefund, DomainError>;
}
