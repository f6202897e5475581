//! Usage accounting
//!
//! Current consumption per limit kind comes from the host application
//! (members, apps, stored vectors, ...). The resolver only reads it.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use planwise_shared::{LimitKind, TenantId};

use crate::error::{BillingError, BillingResult};

/// Current usage by limit kind. Kinds not present count as 0.
pub type Usage = BTreeMap<LimitKind, u64>;

#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn usage(&self, tenant_id: &TenantId) -> BillingResult<Usage>;
}

/// Reports zero usage for every tenant
#[derive(Debug, Clone, Default)]
pub struct NoUsage;

#[async_trait]
impl UsageSource for NoUsage {
    async fn usage(&self, _tenant_id: &TenantId) -> BillingResult<Usage> {
        Ok(Usage::new())
    }
}

/// Fixed usage table
#[derive(Debug, Clone, Default)]
pub struct StaticUsage {
    tenants: HashMap<String, Usage>,
    unavailable: bool,
}

impl StaticUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_usage(mut self, tenant_id: impl Into<String>, kind: LimitKind, used: u64) -> Self {
        self.tenants.entry(tenant_id.into()).or_default().insert(kind, used);
        self
    }

    /// Every lookup fails
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }
}

#[async_trait]
impl UsageSource for StaticUsage {
    async fn usage(&self, tenant_id: &TenantId) -> BillingResult<Usage> {
        if self.unavailable {
            return Err(BillingError::Internal("usage source unavailable".to_string()));
        }
        Ok(self.tenants.get(tenant_id.as_str()).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_usage() {
        let source = StaticUsage::new()
            .with_usage("t1", LimitKind::Members, 4)
            .with_usage("t1", LimitKind::Apps, 2);
        let t1 = TenantId::new("t1").unwrap();
        let t2 = TenantId::new("t2").unwrap();

        let usage = source.usage(&t1).await.unwrap();
        assert_eq!(usage.get(&LimitKind::Members), Some(&4));
        assert_eq!(usage.get(&LimitKind::Apps), Some(&2));
        assert!(source.usage(&t2).await.unwrap().is_empty());
        assert!(NoUsage.usage(&t1).await.unwrap().is_empty());
    }
}
