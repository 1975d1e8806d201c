//! Merchant-side payment, subscription, and refund records.
//!
//! Records are value types: the convergence engine reads a snapshot,
//! computes a successor, and asks the owning store to replace the current
//! value atomically. Correlation between records is by id value only.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::UserId;

/// Lifecycle status of a one-off payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Checkout staged, awaiting the provider's verdict.
    Pending,
    /// Payment captured.
    Succeeded,
    /// Payment attempt failed.
    Failed,
    /// Payment canceled before completion.
    Canceled,
}

impl PaymentStatus {
    /// Total order used to resolve equal-timestamp events without
    /// regressing stronger states.
    pub fn precedence(&self) -> u8 {
        match self {
            PaymentStatus::Pending => 0,
            PaymentStatus::Failed => 1,
            PaymentStatus::Succeeded => 2,
            PaymentStatus::Canceled => 3,
        }
    }

    /// Succeeded is terminal except for re-confirmation of the same status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Succeeded | PaymentStatus::Canceled)
    }
}

/// Lifecycle status of a recurring subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Checkout staged, first payment not yet confirmed.
    Incomplete,
    /// Subscription paid and current.
    Active,
    /// A renewal payment failed; grace period in effect.
    PastDue,
    /// Subscription ended. No transition leaves this state.
    Canceled,
}

impl SubscriptionStatus {
    /// Total order used to resolve equal-timestamp events.
    pub fn precedence(&self) -> u8 {
        match self {
            SubscriptionStatus::Incomplete => 0,
            SubscriptionStatus::PastDue => 1,
            SubscriptionStatus::Active => 2,
            SubscriptionStatus::Canceled => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionStatus::Canceled)
    }

    /// Maps a provider subscription status string onto the record ladder.
    ///
    /// Statuses outside the mapping (`unpaid`, `incomplete_expired`,
    /// `paused`, ...) return `None` and the event is acknowledged without
    /// a transition.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "active" | "trialing" => Some(SubscriptionStatus::Active),
            "past_due" => Some(SubscriptionStatus::PastDue),
            "incomplete" => Some(SubscriptionStatus::Incomplete),
            "canceled" => Some(SubscriptionStatus::Canceled),
            _ => None,
        }
    }
}

/// Lifecycle status of a refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Succeeded,
    Failed,
}

impl RefundStatus {
    /// Maps a provider refund status string onto the record statuses.
    ///
    /// Unrecognized statuses return `None` and the event is acknowledged
    /// without a transition.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "succeeded" => Some(RefundStatus::Succeeded),
            "failed" => Some(RefundStatus::Failed),
            "pending" => Some(RefundStatus::Pending),
            _ => None,
        }
    }
}

/// Record of a one-off payment, keyed by the merchant's business id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Owner of the payment.
    pub user_id: UserId,

    /// Merchant-controlled stable identifier (unique per store).
    pub business_payment_id: String,

    /// Current converged status.
    pub status: PaymentStatus,

    /// Provider payment-intent id, once known.
    pub payment_intent_id: Option<String>,

    /// Provider charge id, once known.
    pub charge_id: Option<String>,

    /// Outcome of a promotion attached at checkout, if any.
    pub promotion_outcome: Option<String>,

    /// Provider coupon id backing the promotion.
    pub promotion_coupon_id: Option<String>,

    /// Provider promotion-code id backing the promotion.
    pub promotion_code_id: Option<String>,

    /// Provider `created` of the newest event applied to this record,
    /// unix seconds. Monotonic non-decreasing across applied transitions.
    pub last_event_created_at: Option<i64>,
}

impl PaymentRecord {
    /// Creates a Pending record at checkout staging time.
    pub fn pending(user_id: UserId, business_payment_id: impl Into<String>) -> Self {
        Self {
            user_id,
            business_payment_id: business_payment_id.into(),
            status: PaymentStatus::Pending,
            payment_intent_id: None,
            charge_id: None,
            promotion_outcome: None,
            promotion_coupon_id: None,
            promotion_code_id: None,
            last_event_created_at: None,
        }
    }

    /// Attaches the provider payment-intent id.
    pub fn with_payment_intent(mut self, payment_intent_id: impl Into<String>) -> Self {
        self.payment_intent_id = Some(payment_intent_id.into());
        self
    }
}

/// Record of a subscription, keyed by the merchant's business id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub user_id: UserId,

    /// Merchant-controlled stable identifier (unique per store).
    pub business_subscription_id: String,

    pub status: SubscriptionStatus,

    /// Provider customer id, once known.
    pub customer_id: Option<String>,

    /// Provider subscription id, once known.
    pub subscription_id: Option<String>,

    pub promotion_outcome: Option<String>,
    pub promotion_coupon_id: Option<String>,
    pub promotion_code_id: Option<String>,

    /// Provider `created` of the newest event applied, unix seconds.
    pub last_event_created_at: Option<i64>,
}

impl SubscriptionRecord {
    /// Creates an Incomplete record at subscription checkout staging time.
    pub fn incomplete(user_id: UserId, business_subscription_id: impl Into<String>) -> Self {
        Self {
            user_id,
            business_subscription_id: business_subscription_id.into(),
            status: SubscriptionStatus::Incomplete,
            customer_id: None,
            subscription_id: None,
            promotion_outcome: None,
            promotion_coupon_id: None,
            promotion_code_id: None,
            last_event_created_at: None,
        }
    }

    /// Attaches the provider subscription id.
    pub fn with_subscription(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }
}

/// Record of a refund, keyed by the merchant's business id.
///
/// References its PaymentRecord by `business_payment_id` value only;
/// no foreign key is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub user_id: UserId,

    /// Merchant-controlled stable identifier (unique per store).
    pub business_refund_id: String,

    /// Business id of the payment being refunded.
    pub business_payment_id: String,

    pub status: RefundStatus,

    /// Payment intent the refund was issued against.
    pub payment_intent_id: Option<String>,

    /// Provider refund id, once known.
    pub refund_id: Option<String>,
}

impl RefundRecord {
    /// Creates a Pending record when the refund is staged.
    pub fn pending(
        user_id: UserId,
        business_refund_id: impl Into<String>,
        business_payment_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            business_refund_id: business_refund_id.into(),
            business_payment_id: business_payment_id.into(),
            status: RefundStatus::Pending,
            payment_intent_id: None,
            refund_id: None,
        }
    }
}
