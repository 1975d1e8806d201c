//! CreateRefundHandler - Command handler for staging refunds.
//!
//! Guardrails before any provider call: the target payment must exist,
//! belong to the requesting user, be in `Succeeded`, and carry a payment
//! intent. The gateway call is idempotent via a deterministic key, so a
//! retried command cannot double-refund.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::domain::payments::{idempotency_key, PaymentStatus, RefundRecord, RefundStatus};
use crate::ports::{PaymentRecordStore, RefundGateway, RefundRecordStore};

/// Command to create a refund for a settled payment.
#[derive(Debug, Clone)]
pub struct CreateRefundCommand {
    /// Requesting user; must own the payment.
    pub user_id: UserId,
    /// Merchant id for the new refund.
    pub business_refund_id: String,
    /// Merchant id of the payment being refunded.
    pub business_payment_id: String,
    /// Caller-supplied idempotency key; derived from the business refund
    /// id when absent.
    pub idempotency_key: Option<String>,
}

/// Result of refund creation.
#[derive(Debug, Clone)]
pub struct CreateRefundResult {
    /// Provider refund id.
    pub refund_id: String,
    /// Status as acknowledged by the provider.
    pub status: RefundStatus,
}

/// Handler for staging refunds against settled payments.
pub struct CreateRefundHandler {
    payments: Arc<dyn PaymentRecordStore>,
    refunds: Arc<dyn RefundRecordStore>,
    gateway: Arc<dyn RefundGateway>,
}

impl CreateRefundHandler {
    pub fn new(
        payments: Arc<dyn PaymentRecordStore>,
        refunds: Arc<dyn RefundRecordStore>,
        gateway: Arc<dyn RefundGateway>,
    ) -> Self {
        Self {
            payments,
            refunds,
            gateway,
        }
    }

    pub async fn handle(&self, cmd: CreateRefundCommand) -> Result<CreateRefundResult, DomainError> {
        if cmd.business_refund_id.is_empty() {
            return Err(DomainError::validation(
                "business_refund_id",
                "id must not be empty",
            ));
        }

        // Replayed command: answer from the stored record without another
        // gateway call.
        if let Some(existing) = self
            .refunds
            .get_by_business_id(&cmd.business_refund_id)
            .await?
        {
            if let Some(refund_id) = existing.refund_id.clone() {
                return Ok(CreateRefundResult {
                    refund_id,
                    status: existing.status,
                });
            }
        }

        let payment = self
            .payments
            .get_by_business_id(&cmd.business_payment_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::RecordNotFound,
                    format!("No payment record for {}", cmd.business_payment_id),
                )
            })?;

        if payment.user_id != cmd.user_id {
            return Err(DomainError::new(
                ErrorCode::Forbidden,
                "Payment belongs to a different user",
            ));
        }
        if payment.status != PaymentStatus::Succeeded {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "Only succeeded payments can be refunded",
            ));
        }
        let payment_intent_id = payment.payment_intent_id.clone().ok_or_else(|| {
            DomainError::validation("payment_intent_id", "Payment has no payment intent")
        })?;

        let mut record = RefundRecord::pending(
            cmd.user_id.clone(),
            cmd.business_refund_id.clone(),
            cmd.business_payment_id.clone(),
        );
        record.payment_intent_id = Some(payment_intent_id.clone());
        self.refunds.save(&record).await?;

        let key = match cmd.idempotency_key {
            Some(key) => key,
            None => idempotency_key::refund(&cmd.business_refund_id)?,
        };

        let provider_refund = self.gateway.create_refund(&payment_intent_id, &key).await?;
        let status =
            RefundStatus::from_provider(&provider_refund.status).unwrap_or(RefundStatus::Pending);

        record.refund_id = Some(provider_refund.id.clone());
        record.status = status;
        self.refunds.save(&record).await?;

        tracing::info!(
            user_id = %cmd.user_id,
            business_refund_id = %cmd.business_refund_id,
            business_payment_id = %cmd.business_payment_id,
            refund_id = %provider_refund.id,
            payment_intent_id = %payment_intent_id,
            "refund staged"
        );

        Ok(CreateRefundResult {
            refund_id: provider_refund.id,
            status,
        })
    }
}
