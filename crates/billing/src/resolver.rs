//! Entitlement resolution
//!
//! Turns a tenant id into a complete [`FeatureSet`]. The fallback order is
//! fixed:
//!
//! 1. billing disabled: sandbox defaults, no provider call
//! 2. no subscription: sandbox defaults, billing disabled
//! 3. subscription lookup failed: [`BillingError::EntitlementResolution`]
//! 4. product metadata missing or unreachable: the plan's own defaults
//! 5. otherwise: metadata values, defaults for any key that is absent
//!
//! At most two provider reads are made per call and nothing is cached.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use planwise_shared::{
    FeatureSet, FlagKind, Interval, LimitKind, PlanId, TenantId, DEFAULT_DOCS_TIER,
};

use crate::catalog::{DefaultEntitlements, PlanCatalog};
use crate::coerce::{
    count_or_zero, flag_metadata_key, flag_or_false, limit_metadata_key, parse_text,
    report_malformed, DOCS_PROCESSING_KEY,
};
use crate::config::DEFAULT_PROVIDER_TIMEOUT_MS;
use crate::error::{BillingError, BillingResult};
use crate::gateway::{call_with_timeout, ProductMetadata, ProviderGateway};
use crate::normalize::{normalize, DraftLimit, FeatureDraft};
use crate::usage::{NoUsage, UsageSource};

pub struct EntitlementResolver {
    gateway: Arc<dyn ProviderGateway>,
    catalog: Arc<PlanCatalog>,
    usage: Arc<dyn UsageSource>,
    billing_enabled: bool,
    provider_timeout: Duration,
}

impl EntitlementResolver {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        catalog: Arc<PlanCatalog>,
        billing_enabled: bool,
    ) -> Self {
        Self {
            gateway,
            catalog,
            usage: Arc::new(NoUsage),
            billing_enabled,
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
        }
    }

    pub fn with_usage(mut self, usage: Arc<dyn UsageSource>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Resolve the entitlements of one tenant.
    ///
    /// Fails only when billing is enabled and the subscription lookup
    /// itself could not be made. Every other gap is filled from the
    /// plan catalog.
    pub async fn resolve(&self, tenant_id: &TenantId) -> BillingResult<FeatureSet> {
        if !self.billing_enabled {
            tracing::debug!(tenant_id = %tenant_id, "Billing disabled, using sandbox entitlements");
            return Ok(self.sandbox(tenant_id).await);
        }

        let lookup = call_with_timeout(
            "find_active_subscription",
            self.provider_timeout,
            self.gateway.find_active_subscription(tenant_id),
        )
        .await;

        let subscription = match lookup {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    "No subscription, using sandbox entitlements"
                );
                return Ok(self.sandbox(tenant_id).await);
            }
            Err(e) => {
                tracing::error!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Subscription lookup failed"
                );
                return Err(BillingError::EntitlementResolution {
                    tenant_id: tenant_id.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let plan = self.catalog.plan_for_subscription(&subscription);
        let interval = subscription.billing_interval();
        let billing_enabled = subscription.is_active();
        let defaults = self.catalog.defaults(plan);

        let product_id = self.catalog.product_id(plan);
        let metadata = match call_with_timeout(
            "get_product_metadata",
            self.provider_timeout,
            self.gateway.get_product_metadata(product_id),
        )
        .await
        {
            Ok(Some(metadata)) => Some(metadata),
            Ok(None) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    plan = %plan,
                    product_id,
                    "Product metadata not found, using plan defaults"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    plan = %plan,
                    product_id,
                    error = %e,
                    "Product metadata unavailable, using plan defaults"
                );
                None
            }
        };

        let mut draft = FeatureDraft {
            billing_enabled,
            plan,
            interval,
            ..FeatureDraft::default()
        };
        if let Some(metadata) = &metadata {
            apply_metadata(&mut draft, metadata);
        }

        tracing::info!(
            tenant_id = %tenant_id,
            plan = %plan,
            interval = %interval,
            billing_enabled,
            subscription_id = %subscription.id,
            "Resolved tenant entitlements"
        );

        Ok(self.finish(tenant_id, draft, defaults).await)
    }

    /// Resolve several tenants concurrently. Each result is independent.
    pub async fn resolve_many(
        &self,
        tenant_ids: &[TenantId],
    ) -> Vec<(TenantId, BillingResult<FeatureSet>)> {
        let results = join_all(tenant_ids.iter().map(|tenant_id| self.resolve(tenant_id))).await;
        tenant_ids.iter().cloned().zip(results).collect()
    }

    async fn sandbox(&self, tenant_id: &TenantId) -> FeatureSet {
        let draft = FeatureDraft {
            billing_enabled: false,
            plan: PlanId::Sandbox,
            interval: Interval::Month,
            ..FeatureDraft::default()
        };
        self.finish(tenant_id, draft, self.catalog.defaults(PlanId::Sandbox))
            .await
    }

    /// Apply current usage and normalize
    async fn finish(
        &self,
        tenant_id: &TenantId,
        mut draft: FeatureDraft,
        defaults: &DefaultEntitlements,
    ) -> FeatureSet {
        match self.usage.usage(tenant_id).await {
            Ok(usage) => {
                for (kind, used) in usage {
                    draft.limits.entry(kind).or_insert_with(DraftLimit::default).used =
                        Some(i64::try_from(used).unwrap_or(i64::MAX));
                }
            }
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Usage unavailable, reporting zero"
                );
            }
        }
        normalize(draft, defaults)
    }
}

/// Copy every metadata value that is present into the draft. Absent keys
/// stay empty so normalization fills them from the plan defaults.
fn apply_metadata(draft: &mut FeatureDraft, metadata: &ProductMetadata) {
    for kind in LimitKind::ALL {
        let key = limit_metadata_key(kind);
        if let Some(raw) = metadata.get(key) {
            draft.limits.entry(kind).or_default().max = Some(count_or_zero(key, raw));
        }
    }

    for kind in FlagKind::ALL {
        let key = flag_metadata_key(kind);
        if let Some(raw) = metadata.get(key) {
            draft.flags.insert(kind, flag_or_false(key, raw));
        }
    }

    if let Some(raw) = metadata.get(DOCS_PROCESSING_KEY) {
        let tier = parse_text(raw).unwrap_or_else(|| {
            report_malformed(DOCS_PROCESSING_KEY, raw, DEFAULT_DOCS_TIER);
            DEFAULT_DOCS_TIER.to_string()
        });
        draft.docs_processing_tier = Some(tier);
    }
}
