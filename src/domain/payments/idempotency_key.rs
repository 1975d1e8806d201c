//! Deterministic idempotency keys for outbound provider operations.
//!
//! Keys are `scope:business_id` when that fits the provider's 255-byte
//! limit; oversized business ids are replaced with their SHA-256 digest so
//! the key stays deterministic and bounded while remaining unique per
//! business id.

use sha2::{Digest, Sha256};

use crate::domain::foundation::ValidationError;

/// Provider-imposed maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// Builds the idempotency key for `(scope, business_id)`.
///
/// Identical inputs always produce identical keys; distinct business ids
/// produce distinct keys (up to SHA-256 collision odds).
///
/// # Errors
///
/// Returns a validation error when either input is empty.
pub fn create(scope: &str, business_id: &str) -> Result<String, ValidationError> {
    if scope.is_empty() {
        return Err(ValidationError::empty_field("scope"));
    }
    if business_id.is_empty() {
        return Err(ValidationError::empty_field("business_id"));
    }

    if scope.len() + 1 + business_id.len() <= MAX_KEY_LEN {
        return Ok(format!("{}:{}", scope, business_id));
    }

    let digest = hex::encode(Sha256::digest(business_id.as_bytes()));
    let scope_budget = MAX_KEY_LEN - 1 - digest.len();
    // Truncate on a char boundary without exceeding the byte budget
    let mut truncated = String::with_capacity(scope_budget);
    for ch in scope.chars() {
        if truncated.len() + ch.len_utf8() > scope_budget {
            break;
        }
        truncated.push(ch);
    }
    Ok(format!("{}:{}", truncated, digest))
}

/// Key for staging a payment checkout session.
pub fn checkout_payment(business_payment_id: &str) -> Result<String, ValidationError> {
    create("checkout_payment", business_payment_id)
}

/// Key for staging a subscription checkout session.
pub fn checkout_subscription(business_subscription_id: &str) -> Result<String, ValidationError> {
    create("checkout_subscription", business_subscription_id)
}

/// Key for creating a refund.
pub fn refund(business_refund_id: &str) -> Result<String, ValidationError> {
    create("refund", business_refund_id)
}

/// Key for creating a provider customer.
pub fn customer(user_id: &str) -> Result<String, ValidationError> {
    create("customer", user_id)
}
