//! Billing errors

use thiserror::Error;

/// Result alias used throughout the billing crate
pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Transport, auth or rate-limit failure talking to the billing provider
    #[error("Billing provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A provider call did not complete within the configured timeout
    #[error("Billing provider call '{operation}' timed out after {timeout_ms}ms")]
    ProviderTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The authoritative "does this tenant have a plan" lookup could not be made
    #[error("Could not resolve entitlements for tenant {tenant_id}: {reason}")]
    EntitlementResolution { tenant_id: String, reason: String },

    #[error("Enterprise service unavailable: {0}")]
    EnterpriseUnavailable(String),

    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("Customer not found")]
    CustomerNotFound,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Whether this error means the provider could not be reached
    pub fn is_provider_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::ProviderTimeout { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SubscriptionNotFound | Self::CustomerNotFound)
    }
}

impl From<stripe::StripeError> for BillingError {
    fn from(err: stripe::StripeError) -> Self {
        BillingError::ProviderUnavailable(err.to_string())
    }
}
