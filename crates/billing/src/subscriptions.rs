//! Subscription and invoice reads

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use planwise_shared::{Interval, PlanId, TenantId};

use crate::catalog::PlanCatalog;
use crate::config::DEFAULT_PROVIDER_TIMEOUT_MS;
use crate::error::{BillingError, BillingResult};
use crate::gateway::{call_with_timeout, Invoice, ProviderGateway, ProviderSubscription};

pub const DEFAULT_INVOICE_LIMIT: usize = 10;
pub const MAX_INVOICE_LIMIT: usize = 100;

/// Subscription as shown to the console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSummary {
    pub id: String,
    pub status: String,
    pub plan: PlanId,
    pub interval: Interval,
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_period_end: Option<OffsetDateTime>,
}

/// Read-only subscription queries for a tenant
pub struct SubscriptionService {
    gateway: Arc<dyn ProviderGateway>,
    catalog: Arc<PlanCatalog>,
    provider_timeout: Duration,
}

impl SubscriptionService {
    pub fn new(gateway: Arc<dyn ProviderGateway>, catalog: Arc<PlanCatalog>) -> Self {
        Self {
            gateway,
            catalog,
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
        }
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// The tenant's subscription, optionally required to be on a given
    /// plan and interval
    pub async fn get_subscription(
        &self,
        tenant_id: &TenantId,
        plan: Option<PlanId>,
        interval: Option<Interval>,
    ) -> BillingResult<SubscriptionSummary> {
        let subscription = call_with_timeout(
            "find_active_subscription",
            self.provider_timeout,
            self.gateway.find_active_subscription(tenant_id),
        )
        .await?
        .ok_or(BillingError::SubscriptionNotFound)?;

        let summary = self.summarize(subscription);

        let plan_mismatch = plan.is_some_and(|p| p != summary.plan);
        let interval_mismatch = interval.is_some_and(|i| i != summary.interval);
        if plan_mismatch || interval_mismatch {
            tracing::debug!(
                tenant_id = %tenant_id,
                plan = %summary.plan,
                interval = %summary.interval,
                "Subscription does not match requested plan or interval"
            );
            return Err(BillingError::SubscriptionNotFound);
        }

        Ok(summary)
    }

    /// Most recent invoices first. `limit` defaults to 10 and is clamped to
    /// `1..=100`.
    pub async fn list_invoices(
        &self,
        tenant_id: &TenantId,
        limit: Option<usize>,
    ) -> BillingResult<Vec<Invoice>> {
        let limit = limit
            .unwrap_or(DEFAULT_INVOICE_LIMIT)
            .clamp(1, MAX_INVOICE_LIMIT);

        call_with_timeout(
            "get_invoices",
            self.provider_timeout,
            self.gateway.get_invoices(tenant_id, limit),
        )
        .await
    }

    fn summarize(&self, subscription: ProviderSubscription) -> SubscriptionSummary {
        let plan = self.catalog.plan_for_subscription(&subscription);
        let interval = subscription.billing_interval();

        SubscriptionSummary {
            id: subscription.id,
            status: subscription.status,
            plan,
            interval,
            current_period_end: subscription.current_period_end,
        }
    }
}
