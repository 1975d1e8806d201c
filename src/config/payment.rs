//! Payment configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    #[serde(default)]
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    #[serde(default)]
    pub stripe_webhook_secret: String,

    /// Override for the Stripe API base URL (testing)
    #[serde(default)]
    pub stripe_api_base_url: Option<String>,

    /// Acceptance window for signed webhook timestamps, seconds
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,

    /// Dedupe processing lease, seconds
    #[serde(default = "default_processing_lease")]
    pub processing_lease_secs: i64,

    /// Reject test-mode events (enable in production)
    #[serde(default)]
    pub require_livemode: bool,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_api_base_url: None,
            webhook_tolerance_secs: default_webhook_tolerance(),
            processing_lease_secs: default_processing_lease(),
            require_livemode: false,
        }
    }
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if self.webhook_tolerance_secs <= 0 {
            return Err(ValidationError::InvalidTolerance);
        }
        if self.processing_lease_secs <= 0 {
            return Err(ValidationError::InvalidLease);
        }

        Ok(())
    }
}

fn default_webhook_tolerance() -> i64 {
    300
}

fn default_processing_lease() -> i64 {
    300
}
