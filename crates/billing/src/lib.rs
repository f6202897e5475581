// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Planwise Billing Module
//!
//! Resolves tenants into feature entitlements from the billing provider.
//!
//! ## Features
//!
//! - **Plan Catalog**: Compiled-in plan table with environment overrides
//! - **Provider Gateway**: Read-only Stripe access behind a trait, with in-memory double
//! - **Entitlement Resolution**: Fixed fallback order, never a partial result
//! - **Normalization**: Total correction of malformed provider data
//! - **System Features**: Enterprise SSO settings
//! - **Subscriptions & Invoices**: Read endpoints for the console

pub mod catalog;
pub mod client;
pub mod coerce;
pub mod config;
pub mod error;
pub mod gateway;
pub mod invariants;
pub mod memory;
pub mod normalize;
pub mod resolver;
pub mod subscriptions;
pub mod system;
pub mod usage;
pub mod workspace;


// Catalog
pub use catalog::{CatalogEntry, DefaultEntitlements, PlanCatalog, PriceIds};

// Stripe
pub use client::{StripeClient, StripeGateway};

// Configuration
pub use config::{BillingConfig, EnterpriseConfig, StripeConfig};

// Error types
pub use error::{BillingError, BillingResult};

// Gateway
pub use gateway::{
    call_with_timeout, Invoice, ProductMetadata, ProviderCustomer, ProviderGateway,
    ProviderSubscription, UnconfiguredGateway,
};
pub use memory::{GatewayOperation, InMemoryGateway};

// Invariants
pub use invariants::{
    available_checks, check_feature_draft, is_valid, run_all_checks, InvariantCheckSummary,
    InvariantViolation, ViolationSeverity,
};

// Resolution
pub use normalize::{normalize, DraftLimit, FeatureDraft};
pub use resolver::EntitlementResolver;
pub use usage::{NoUsage, StaticUsage, Usage, UsageSource};

// Subscriptions
pub use subscriptions::{SubscriptionService, SubscriptionSummary};

// System features
pub use system::{
    EnterpriseInfo, EnterpriseInfoSource, HttpEnterpriseInfo, StaticEnterpriseInfo,
    SystemFeatureService,
};

// Workspace
pub use workspace::{WorkspaceBillingSummary, WorkspaceStatus};

use std::sync::Arc;

use planwise_shared::{FeatureSet, SystemFeatureSet, TenantId};

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub entitlements: EntitlementResolver,
    pub subscriptions: SubscriptionService,
    pub system: SystemFeatureService,
}

impl BillingService {
    /// Create a new billing service from environment variables
    pub fn from_env() -> BillingResult<Self> {
        let config = BillingConfig::from_env()?;
        Self::from_config(&config, PlanCatalog::from_env())
    }

    /// Wire the Stripe gateway and enterprise client described by `config`.
    ///
    /// Without Stripe credentials every provider call reports the provider
    /// as unavailable; without enterprise settings the enterprise service
    /// does too.
    pub fn from_config(config: &BillingConfig, catalog: PlanCatalog) -> BillingResult<Self> {
        let gateway: Arc<dyn ProviderGateway> = match &config.stripe {
            Some(stripe) => Arc::new(StripeGateway::from_config(stripe.clone())),
            None => {
                if config.billing_enabled {
                    return Err(BillingError::Config(
                        "billing is enabled but no Stripe configuration was provided".to_string(),
                    ));
                }
                Arc::new(UnconfiguredGateway)
            }
        };

        let enterprise: Arc<dyn EnterpriseInfoSource> = match &config.enterprise {
            Some(enterprise) => Arc::new(HttpEnterpriseInfo::new(
                enterprise.clone(),
                config.provider_timeout,
            )?),
            None => Arc::new(StaticEnterpriseInfo(None)),
        };

        tracing::info!(
            billing_enabled = config.billing_enabled,
            enterprise_enabled = config.enterprise_enabled,
            stripe_configured = config.stripe.is_some(),
            "Billing service configured"
        );

        Ok(Self::new(
            config,
            gateway,
            Arc::new(catalog),
            enterprise,
            Arc::new(NoUsage),
        ))
    }

    /// Create a new billing service with explicit collaborators
    pub fn new(
        config: &BillingConfig,
        gateway: Arc<dyn ProviderGateway>,
        catalog: Arc<PlanCatalog>,
        enterprise: Arc<dyn EnterpriseInfoSource>,
        usage: Arc<dyn UsageSource>,
    ) -> Self {
        Self {
            entitlements: EntitlementResolver::new(
                gateway.clone(),
                catalog.clone(),
                config.billing_enabled,
            )
            .with_usage(usage)
            .with_provider_timeout(config.provider_timeout),
            subscriptions: SubscriptionService::new(gateway, catalog)
                .with_provider_timeout(config.provider_timeout),
            system: SystemFeatureService::new(config.enterprise_enabled, enterprise),
        }
    }

    pub async fn resolve(&self, tenant_id: &TenantId) -> BillingResult<FeatureSet> {
        self.entitlements.resolve(tenant_id).await
    }

    pub async fn get_system_entitlements(&self) -> BillingResult<SystemFeatureSet> {
        self.system.get_system_entitlements().await
    }

    pub async fn workspace_summary(&self, tenant_id: &TenantId) -> WorkspaceBillingSummary {
        let resolution = self.resolve(tenant_id).await;
        WorkspaceBillingSummary::from_resolution(tenant_id, &resolution)
    }
}
