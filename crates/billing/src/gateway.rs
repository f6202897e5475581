//! Provider gateway
//!
//! The only seam between the billing core and the external system of
//! record. Every operation is a read and safe to repeat.
//!
//! Outcomes are split three ways:
//! - `Ok(Some(_))`: found
//! - `Ok(None)`: not found, an expected outcome the caller falls back from
//! - `Err(_)`: the provider could not be asked ([`BillingError::is_provider_unavailable`])

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use planwise_shared::{Interval, TenantId};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::coerce::report_malformed;
use crate::error::{BillingError, BillingResult};

/// Metadata key holding the tenant id on subscriptions and customers
pub const TENANT_METADATA_KEY: &str = "tenant_id";

/// Subscription record as seen at the gateway boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    /// Raw provider status (`active`, `past_due`, `canceled`, ...)
    pub status: String,
    pub tenant_id: String,
    /// Plan name or nickname, not yet normalized
    pub plan_name: Option<String>,
    /// Billing interval, not yet normalized
    pub interval: Option<String>,
    pub price_id: Option<String>,
    pub product_id: Option<String>,
    pub customer_id: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub current_period_end: Option<OffsetDateTime>,
}

impl ProviderSubscription {
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    /// Billing interval; missing or unrecognized means monthly
    pub fn billing_interval(&self) -> Interval {
        match self.interval.as_deref() {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                report_malformed(
                    "interval",
                    &serde_json::Value::String(raw.to_string()),
                    Interval::Month.as_str(),
                );
                Interval::Month
            }),
            None => Interval::Month,
        }
    }
}

/// Raw key/value metadata describing a plan's limits and flags.
///
/// Values are kept as JSON so native booleans and numbers survive next to
/// the stringly-typed values Stripe returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductMetadata {
    values: HashMap<String, serde_json::Value>,
}

impl ProductMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_strings(values: HashMap<String, String>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect(),
        }
    }

    pub fn insert(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }
}

/// Customer record as seen at the gateway boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCustomer {
    pub id: String,
    pub email: Option<String>,
    pub tenant_id: String,
}

/// Invoice record as seen at the gateway boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub status: Option<String>,
    pub amount_paid: i64,
    pub amount_due: i64,
    pub currency: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub period_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub period_end: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    pub hosted_invoice_url: Option<String>,
}

/// Read-only access to the billing provider
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// First subscription, in provider list order, whose tenant tag equals
    /// `tenant_id` exactly
    async fn find_active_subscription(
        &self,
        tenant_id: &TenantId,
    ) -> BillingResult<Option<ProviderSubscription>>;

    async fn get_product_metadata(&self, product_id: &str)
        -> BillingResult<Option<ProductMetadata>>;

    /// Most-recent-first, at most `limit` entries. No customer means no invoices.
    async fn get_invoices(&self, tenant_id: &TenantId, limit: usize) -> BillingResult<Vec<Invoice>>;

    /// Customer whose tenant tag matches, optionally narrowed by email
    async fn find_customer(
        &self,
        tenant_id: &TenantId,
        email: Option<&str>,
    ) -> BillingResult<Option<ProviderCustomer>>;
}

/// Run a provider call under a deadline. An elapsed deadline is reported as
/// [`BillingError::ProviderTimeout`], which counts as unavailability.
pub async fn call_with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> BillingResult<T>
where
    F: Future<Output = BillingResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Billing provider call timed out"
            );
            Err(BillingError::ProviderTimeout {
                operation,
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

/// Gateway used when no provider credentials are configured
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredGateway;

impl UnconfiguredGateway {
    fn unavailable<T>() -> BillingResult<T> {
        Err(BillingError::ProviderUnavailable(
            "billing provider not configured".to_string(),
        ))
    }
}

#[async_trait]
impl ProviderGateway for UnconfiguredGateway {
    async fn find_active_subscription(
        &self,
        _tenant_id: &TenantId,
    ) -> BillingResult<Option<ProviderSubscription>> {
        Self::unavailable()
    }

    async fn get_product_metadata(
        &self,
        _product_id: &str,
    ) -> BillingResult<Option<ProductMetadata>> {
        Self::unavailable()
    }

    async fn get_invoices(
        &self,
        _tenant_id: &TenantId,
        _limit: usize,
    ) -> BillingResult<Vec<Invoice>> {
        Self::unavailable()
    }

    async fn find_customer(
        &self,
        _tenant_id: &TenantId,
        _email: Option<&str>,
    ) -> BillingResult<Option<ProviderCustomer>> {
        Self::unavailable()
    }
}
