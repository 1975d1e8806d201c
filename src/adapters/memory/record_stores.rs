//! In-memory implementations of the record stores.
//!
//! Each store keeps the primary map (business id -> record) and the
//! secondary index (provider id -> business id) under one `RwLock`, so a
//! save and its reindex are a single atomic step and the index can never
//! dangle: a save that rewrites the provider id removes the stale mapping
//! before installing the new one.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::DomainError;
use crate::domain::payments::{PaymentRecord, RefundRecord, SubscriptionRecord};
use crate::ports::{PaymentRecordStore, RefundRecordStore, SubscriptionRecordStore};

fn require_non_empty(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::validation(field, "id must not be empty"));
    }
    Ok(())
}

fn require_provider_id_non_empty(
    field: &'static str,
    value: Option<&str>,
) -> Result<(), DomainError> {
    if value == Some("") {
        return Err(DomainError::validation(field, "id must not be empty"));
    }
    Ok(())
}

// ════════════════════════════════════════════════════════════════════
// Payments
// ════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct PaymentMaps {
    by_business: HashMap<String, PaymentRecord>,
    business_by_provider: HashMap<String, String>,
}

/// In-memory payment record store.
pub struct InMemoryPaymentStore {
    maps: RwLock<PaymentMaps>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(PaymentMaps::default()),
        }
    }
}

impl Default for InMemoryPaymentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentRecordStore for InMemoryPaymentStore {
    async fn save(&self, record: &PaymentRecord) -> Result<(), DomainError> {
        require_non_empty("business_payment_id", &record.business_payment_id)?;
        require_provider_id_non_empty("payment_intent_id", record.payment_intent_id.as_deref())?;

        let mut maps = self.maps.write().await;

        let stale_provider_id = maps
            .by_business
            .get(&record.business_payment_id)
            .and_then(|previous| previous.payment_intent_id.clone())
            .filter(|old| Some(old) != record.payment_intent_id.as_ref());
        if let Some(old_provider) = stale_provider_id {
            maps.business_by_provider.remove(&old_provider);
        }
        if let Some(provider_id) = &record.payment_intent_id {
            maps.business_by_provider
                .insert(provider_id.clone(), record.business_payment_id.clone());
        }
        maps.by_business
            .insert(record.business_payment_id.clone(), record.clone());

        Ok(())
    }

    async fn get_by_business_id(
        &self,
        business_payment_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        require_non_empty("business_payment_id", business_payment_id)?;
        let maps = self.maps.read().await;
        Ok(maps.by_business.get(business_payment_id).cloned())
    }

    async fn get_by_provider_id(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentRecord>, DomainError> {
        require_non_empty("payment_intent_id", payment_intent_id)?;
        let maps = self.maps.read().await;
        Ok(maps
            .business_by_provider
            .get(payment_intent_id)
            .and_then(|business_id| maps.by_business.get(business_id))
            .cloned())
    }
}

// ════════════════════════════════════════════════════════════════════
// Subscriptions
// ════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct SubscriptionMaps {
    by_business: HashMap<String, SubscriptionRecord>,
    business_by_provider: HashMap<String, String>,
}

/// In-memory subscription record store.
pub struct InMemorySubscriptionStore {
    maps: RwLock<SubscriptionMaps>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(SubscriptionMaps::default()),
        }
    }
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriptionRecordStore for InMemorySubscriptionStore {
    async fn save(&self, record: &SubscriptionRecord) -> Result<(), DomainError> {
        require_non_empty("business_subscription_id", &record.business_subscription_id)?;
        require_provider_id_non_empty("subscription_id", record.subscription_id.as_deref())?;

        let mut maps = self.maps.write().await;

        let stale_provider_id = maps
            .by_business
            .get(&record.business_subscription_id)
            .and_then(|previous| previous.subscription_id.clone())
            .filter(|old| Some(old) != record.subscription_id.as_ref());
        if let Some(old_provider) = stale_provider_id {
            maps.business_by_provider.remove(&old_provider);
        }
        if let Some(provider_id) = &record.subscription_id {
            maps.business_by_provider
                .insert(provider_id.clone(), record.business_subscription_id.clone());
        }
        maps.by_business
            .insert(record.business_subscription_id.clone(), record.clone());

        Ok(())
    }

    async fn get_by_business_id(
        &self,
        business_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        require_non_empty("business_subscription_id", business_subscription_id)?;
        let maps = self.maps.read().await;
        Ok(maps.by_business.get(business_subscription_id).cloned())
    }

    async fn get_by_provider_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, DomainError> {
        require_non_empty("subscription_id", subscription_id)?;
        let maps = self.maps.read().await;
        Ok(maps
            .business_by_provider
            .get(subscription_id)
            .and_then(|business_id| maps.by_business.get(business_id))
            .cloned())
    }
}

// ════════════════════════════════════════════════════════════════════
// Refunds
// ════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct RefundMaps {
    by_business: HashMap<String, RefundRecord>,
    business_by_provider: HashMap<String, String>,
}

/// In-memory refund record store.
pub struct InMemoryRefundStore {
    maps: RwLock<RefundMaps>,
}

impl InMemoryRefundStore {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(RefundMaps::default()),
        }
    }
}

impl Default for InMemoryRefundStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RefundRecordStore for InMemoryRefundStore {
    async fn save(&self, record: &RefundRecord) -> Result<(), DomainError> {
        require_non_empty("business_refund_id", &record.business_refund_id)?;
        require_provider_id_non_empty("refund_id", record.refund_id.as_deref())?;

        let mut maps = self.maps.write().await;

        let stale_provider_id = maps
            .by_business
            .get(&record.business_refund_id)
            .and_then(|previous| previous.refund_id.clone())
            .filter(|old| Some(old) != record.refund_id.as_ref());
        if let Some(old_provider) = stale_provider_id {
            maps.business_by_provider.remove(&old_provider);
        }
        if let Some(provider_id) = &record.refund_id {
            maps.business_by_provider
                .insert(provider_id.clone(), record.business_refund_id.clone());
        }
        maps.by_business
            .insert(record.business_refund_id.clone(), record.clone());

        Ok(())
    }

    async fn get_by_business_id(
        &self,
        business_refund_id: &str,
    ) -> Result<Option<RefundRecord>, DomainError> {
        require_non_empty("business_refund_id", business_refund_id)?;
        let maps = self.maps.read().await;
        Ok(maps.by_business.get(business_refund_id).cloned())
    }

    async fn get_by_provider_id(
        &self,
        refund_id: &str,
    ) -> Result<Option<RefundRecord>, DomainError> {
        require_non_empty("refund_id", refund_id)?;
        let maps = self.maps.read().await;
        Ok(maps
            .business_by_provider
            .get(refund_id)
            .and_then(|business_id| maps.by_business.get(business_id))
            .cloned())
    }
}
