//! Billing configuration loaded from the deployment environment

use std::fmt;
use std::time::Duration;

use planwise_shared::{env_flag, env_parse, env_string};

use crate::error::{BillingError, BillingResult};

pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_PAGES: usize = 10;
pub const DEFAULT_STRIPE_MAX_RETRIES: usize = 2;

/// Stripe connection settings
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Alternate API base, used to point the client at a mock server
    pub api_base: Option<String>,
    /// Retries for idempotent reads before the failure is surfaced
    pub max_retries: usize,
    /// Upper bound on pages walked by linear scans
    pub max_pages: usize,
}

impl fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[redacted]")
            .field("api_base", &self.api_base)
            .field("max_retries", &self.max_retries)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: None,
            max_retries: DEFAULT_STRIPE_MAX_RETRIES,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Load from `STRIPE_API_SECRET_KEY` and friends. `None` when no key is set.
    pub fn from_env() -> Option<Self> {
        let secret_key = env_string("STRIPE_API_SECRET_KEY")?;
        Some(Self {
            secret_key,
            api_base: env_string("STRIPE_API_BASE"),
            max_retries: env_parse("STRIPE_MAX_RETRIES", DEFAULT_STRIPE_MAX_RETRIES),
            max_pages: env_parse("BILLING_MAX_PAGES", DEFAULT_MAX_PAGES).max(1),
        })
    }
}

/// Enterprise info service settings
#[derive(Clone)]
pub struct EnterpriseConfig {
    pub api_url: String,
    pub secret_key: String,
}

impl fmt::Debug for EnterpriseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnterpriseConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"[redacted]")
            .finish()
    }
}

/// Deployment-level switches for the billing core
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Global billing switch. When off no provider call is ever made.
    pub billing_enabled: bool,
    /// Enterprise mode for system (SSO) entitlements
    pub enterprise_enabled: bool,
    /// Timeout applied around every provider call
    pub provider_timeout: Duration,
    pub stripe: Option<StripeConfig>,
    pub enterprise: Option<EnterpriseConfig>,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            billing_enabled: false,
            enterprise_enabled: false,
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            stripe: None,
            enterprise: None,
        }
    }
}

impl BillingConfig {
    pub fn from_env() -> BillingResult<Self> {
        let billing_enabled = env_flag("BILLING_ENABLED", false);
        let enterprise_enabled = env_flag("ENTERPRISE_ENABLED", false);
        let stripe = StripeConfig::from_env();

        if billing_enabled && stripe.is_none() {
            return Err(BillingError::Config(
                "BILLING_ENABLED is set but STRIPE_API_SECRET_KEY is missing".to_string(),
            ));
        }

        let enterprise = match (
            env_string("ENTERPRISE_API_URL"),
            env_string("ENTERPRISE_API_SECRET_KEY"),
        ) {
            (Some(api_url), Some(secret_key)) => Some(EnterpriseConfig {
                api_url,
                secret_key,
            }),
            _ => None,
        };

        if enterprise_enabled && enterprise.is_none() {
            return Err(BillingError::Config(
                "ENTERPRISE_ENABLED is set but ENTERPRISE_API_URL or \
                 ENTERPRISE_API_SECRET_KEY is missing"
                    .to_string(),
            ));
        }

        let timeout_ms = env_parse("BILLING_PROVIDER_TIMEOUT_MS", DEFAULT_PROVIDER_TIMEOUT_MS);

        Ok(Self {
            billing_enabled,
            enterprise_enabled,
            provider_timeout: Duration::from_millis(timeout_ms.max(1)),
            stripe,
            enterprise,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 8] = [
        "BILLING_ENABLED",
        "ENTERPRISE_ENABLED",
        "ENTERPRISE_API_URL",
        "ENTERPRISE_API_SECRET_KEY",
        "STRIPE_API_SECRET_KEY",
        "STRIPE_API_BASE",
        "BILLING_PROVIDER_TIMEOUT_MS",
        "BILLING_MAX_PAGES",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear_env();
        let config = BillingConfig::from_env().unwrap();
        assert!(!config.billing_enabled);
        assert!(!config.enterprise_enabled);
        assert!(config.stripe.is_none());
        assert_eq!(
            config.provider_timeout,
            Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS)
        );
    }

    #[test]
    #[serial]
    fn test_billing_enabled_requires_stripe_key() {
        clear_env();
        std::env::set_var("BILLING_ENABLED", "true");
        let err = BillingConfig::from_env().unwrap_err();
        assert!(matches!(err, BillingError::Config(_)));

        std::env::set_var("STRIPE_API_SECRET_KEY", "sk_test_123");
        std::env::set_var("BILLING_MAX_PAGES", "3");
        let config = BillingConfig::from_env().unwrap();
        assert!(config.billing_enabled);
        let stripe = config.stripe.unwrap();
        assert_eq!(stripe.max_pages, 3);
        assert!(!format!("{:?}", stripe).contains("sk_test_123"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_enterprise_enabled_requires_url_and_key() {
        clear_env();
        std::env::set_var("ENTERPRISE_ENABLED", "1");
        std::env::set_var("ENTERPRISE_API_URL", "http://enterprise.internal");
        assert!(BillingConfig::from_env().is_err());

        std::env::set_var("ENTERPRISE_API_SECRET_KEY", "secret");
        let config = BillingConfig::from_env().unwrap();
        assert!(config.enterprise_enabled);
        assert_eq!(
            config.enterprise.unwrap().api_url,
            "http://enterprise.internal"
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_timeout_falls_back_to_default() {
        clear_env();
        std::env::set_var("BILLING_PROVIDER_TIMEOUT_MS", "soon");
        let config = BillingConfig::from_env().unwrap();
        assert_eq!(
            config.provider_timeout,
            Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS)
        );
        clear_env();
    }
}
