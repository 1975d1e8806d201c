//! Feature flags configuration

use serde::Deserialize;

use crate::domain::payments::ModuleFlags;

/// Feature flags for enabling/disabling engine modules
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    /// Handle one-off payment events (defaults to true)
    #[serde(default = "default_enabled")]
    pub enable_payments: bool,

    /// Handle subscription billing events (defaults to true)
    #[serde(default = "default_enabled")]
    pub enable_billing: bool,

    /// Handle refund events (defaults to true)
    #[serde(default = "default_enabled")]
    pub enable_refunds: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_payments: true,
            enable_billing: true,
            enable_refunds: true,
        }
    }
}

impl FeatureFlags {
    /// Converts the flags into the engine's module switches.
    pub fn module_flags(&self) -> ModuleFlags {
        ModuleFlags {
            payments: self.enable_payments,
            billing: self.enable_billing,
            refunds: self.enable_refunds,
        }
    }
}

fn default_enabled() -> bool {
    true
}
