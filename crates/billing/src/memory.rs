//! In-memory provider gateway
//!
//! Holds subscriptions, product metadata, customers and invoices in plain
//! collections. Used by tests and local development; supports failure
//! injection, artificial latency and per-operation call counting.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use planwise_shared::TenantId;

use crate::error::{BillingError, BillingResult};
use crate::gateway::{
    Invoice, ProductMetadata, ProviderCustomer, ProviderGateway, ProviderSubscription,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOperation {
    FindActiveSubscription,
    GetProductMetadata,
    GetInvoices,
    FindCustomer,
}

impl GatewayOperation {
    const ALL: [GatewayOperation; 4] = [
        GatewayOperation::FindActiveSubscription,
        GatewayOperation::GetProductMetadata,
        GatewayOperation::GetInvoices,
        GatewayOperation::FindCustomer,
    ];

    fn index(self) -> usize {
        match self {
            GatewayOperation::FindActiveSubscription => 0,
            GatewayOperation::GetProductMetadata => 1,
            GatewayOperation::GetInvoices => 2,
            GatewayOperation::FindCustomer => 3,
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryGateway {
    subscriptions: Vec<ProviderSubscription>,
    products: HashMap<String, ProductMetadata>,
    /// Keyed by customer id
    invoices: HashMap<String, Vec<Invoice>>,
    customers: Vec<ProviderCustomer>,
    failing: HashSet<GatewayOperation>,
    delays: HashMap<GatewayOperation, Duration>,
    calls: [AtomicUsize; 4],
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriptions are searched in insertion order
    pub fn with_subscription(mut self, subscription: ProviderSubscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn with_product_metadata(
        mut self,
        product_id: impl Into<String>,
        metadata: ProductMetadata,
    ) -> Self {
        self.products.insert(product_id.into(), metadata);
        self
    }

    pub fn with_customer(mut self, customer: ProviderCustomer) -> Self {
        self.customers.push(customer);
        self
    }

    /// Invoices belong to a customer; a tenant sees them only once a
    /// customer tagged with its id exists
    pub fn with_invoice(mut self, customer_id: impl Into<String>, invoice: Invoice) -> Self {
        self.invoices.entry(customer_id.into()).or_default().push(invoice);
        self
    }

    /// Make `operation` fail as if the provider were unreachable
    pub fn failing(mut self, operation: GatewayOperation) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Sleep before answering every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        for operation in GatewayOperation::ALL {
            self.delays.insert(operation, delay);
        }
        self
    }

    /// Sleep before answering calls to `operation` only
    pub fn with_operation_delay(mut self, operation: GatewayOperation, delay: Duration) -> Self {
        self.delays.insert(operation, delay);
        self
    }

    pub fn calls(&self, operation: GatewayOperation) -> usize {
        self.calls[operation.index()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        GatewayOperation::ALL.iter().map(|op| self.calls(*op)).sum()
    }

    fn customer_of(&self, tenant_id: &TenantId, email: Option<&str>) -> Option<&ProviderCustomer> {
        self.customers
            .iter()
            .filter(|c| email.is_none() || c.email.as_deref() == email)
            .find(|c| c.tenant_id == tenant_id.as_str())
    }

    async fn enter(&self, operation: GatewayOperation) -> BillingResult<()> {
        self.calls[operation.index()].fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&operation) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&operation) {
            return Err(BillingError::ProviderUnavailable(format!(
                "injected failure for {:?}",
                operation
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderGateway for InMemoryGateway {
    async fn find_active_subscription(
        &self,
        tenant_id: &TenantId,
    ) -> BillingResult<Option<ProviderSubscription>> {
        self.enter(GatewayOperation::FindActiveSubscription).await?;
        Ok(self
            .subscriptions
            .iter()
            .find(|s| s.tenant_id == tenant_id.as_str())
            .cloned())
    }

    async fn get_product_metadata(
        &self,
        product_id: &str,
    ) -> BillingResult<Option<ProductMetadata>> {
        self.enter(GatewayOperation::GetProductMetadata).await?;
        Ok(self.products.get(product_id).cloned())
    }

    async fn get_invoices(
        &self,
        tenant_id: &TenantId,
        limit: usize,
    ) -> BillingResult<Vec<Invoice>> {
        self.enter(GatewayOperation::GetInvoices).await?;
        let Some(customer) = self.customer_of(tenant_id, None) else {
            return Ok(Vec::new());
        };
        let mut invoices = self
            .invoices
            .get(&customer.id)
            .cloned()
            .unwrap_or_default();
        invoices.sort_by(|a, b| b.created.cmp(&a.created));
        invoices.truncate(limit);
        Ok(invoices)
    }

    async fn find_customer(
        &self,
        tenant_id: &TenantId,
        email: Option<&str>,
    ) -> BillingResult<Option<ProviderCustomer>> {
        self.enter(GatewayOperation::FindCustomer).await?;
        Ok(self.customer_of(tenant_id, email).cloned())
    }
}
