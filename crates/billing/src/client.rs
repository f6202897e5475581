//! Stripe client and the provider gateway backed by it

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use stripe::{
    Client, Customer, Expandable, Invoice as StripeInvoice, InvoiceStatus, ListCustomers,
    ListInvoices, ListSubscriptions, Product, ProductId, StripeError, Subscription,
    SubscriptionStatus,
};
use time::OffsetDateTime;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use planwise_shared::TenantId;

use crate::config::StripeConfig;
use crate::error::{BillingError, BillingResult};
use crate::gateway::{
    Invoice, ProductMetadata, ProviderCustomer, ProviderGateway, ProviderSubscription,
    TENANT_METADATA_KEY,
};

/// Page size used for linear scans
const PAGE_SIZE: u64 = 100;

/// Stripe API client wrapper
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        let client = match &config.api_base {
            Some(base) => Client::from_url(base.as_str(), config.secret_key.as_str()),
            None => Client::new(config.secret_key.as_str()),
        };
        Self { client, config }
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &StripeConfig {
        &self.config
    }

    /// Run an idempotent read, retrying rate limits, server errors and
    /// transport timeouts with exponential backoff and jitter
    async fn read<T, F, Fut>(&self, operation: &'static str, action: F) -> Result<T, StripeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StripeError>>,
    {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(self.config.max_retries);

        RetryIf::spawn(strategy, action, |e: &StripeError| {
            let retry = is_retryable(e);
            if retry {
                tracing::warn!(operation, error = %e, "Retrying Stripe read after transient error");
            }
            retry
        })
        .await
    }
}

fn is_retryable(error: &StripeError) -> bool {
    match error {
        StripeError::Stripe(request_error) => {
            let status = request_error.http_status;
            status == 429 || (500..600).contains(&status)
        }
        StripeError::Timeout => true,
        _ => false,
    }
}

fn is_not_found(error: &StripeError) -> bool {
    matches!(error, StripeError::Stripe(request_error) if request_error.http_status == 404)
}

fn status_str(status: &SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::Canceled => "canceled",
        SubscriptionStatus::Incomplete => "incomplete",
        SubscriptionStatus::IncompleteExpired => "incomplete_expired",
        SubscriptionStatus::PastDue => "past_due",
        SubscriptionStatus::Trialing => "trialing",
        SubscriptionStatus::Unpaid => "unpaid",
        SubscriptionStatus::Paused => "paused",
    }
}

fn invoice_status_str(status: &InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Draft => "draft",
        InvoiceStatus::Open => "open",
        InvoiceStatus::Paid => "paid",
        InvoiceStatus::Uncollectible => "uncollectible",
        InvoiceStatus::Void => "void",
    }
}

fn timestamp(ts: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(ts).ok()
}

fn tenant_tag(metadata: &HashMap<String, String>) -> Option<&str> {
    metadata.get(TENANT_METADATA_KEY).map(String::as_str)
}

fn map_subscription(sub: &Subscription, tenant_id: &str) -> ProviderSubscription {
    let item = sub.items.data.first();
    let plan = item.and_then(|i| i.plan.as_ref());
    let price = item.and_then(|i| i.price.as_ref());

    let plan_name = plan
        .and_then(|p| p.nickname.clone())
        .or_else(|| price.and_then(|p| p.nickname.clone()));
    let interval = plan
        .and_then(|p| p.interval.as_ref())
        .map(|i| i.as_str().to_string())
        .or_else(|| {
            price
                .and_then(|p| p.recurring.as_ref())
                .map(|r| r.interval.as_str().to_string())
        });
    let product_id = price
        .and_then(|p| p.product.as_ref())
        .map(|product| match product {
            Expandable::Id(id) => id.to_string(),
            Expandable::Object(product) => product.id.to_string(),
        });
    let customer_id = match &sub.customer {
        Expandable::Id(id) => id.to_string(),
        Expandable::Object(customer) => customer.id.to_string(),
    };

    ProviderSubscription {
        id: sub.id.to_string(),
        status: status_str(&sub.status).to_string(),
        tenant_id: tenant_id.to_string(),
        plan_name,
        interval,
        price_id: price.map(|p| p.id.to_string()),
        product_id,
        customer_id: Some(customer_id),
        current_period_end: timestamp(sub.current_period_end),
    }
}

fn map_invoice(invoice: StripeInvoice) -> Invoice {
    Invoice {
        id: invoice.id.to_string(),
        status: invoice.status.as_ref().map(|s| invoice_status_str(s).to_string()),
        amount_paid: invoice.amount_paid.unwrap_or(0),
        amount_due: invoice.amount_due.unwrap_or(0),
        currency: invoice.currency.map(|c| c.to_string()),
        period_start: invoice.period_start.and_then(timestamp),
        period_end: invoice.period_end.and_then(timestamp),
        created: invoice.created.and_then(timestamp),
        hosted_invoice_url: invoice.hosted_invoice_url,
    }
}

/// Provider gateway backed by the Stripe API.
///
/// Tenant lookups are linear scans over paginated lists, bounded by
/// `max_pages`.
#[derive(Clone)]
pub struct StripeGateway {
    stripe: StripeClient,
}

impl StripeGateway {
    pub fn new(stripe: StripeClient) -> Self {
        Self { stripe }
    }

    pub fn from_config(config: StripeConfig) -> Self {
        Self::new(StripeClient::new(config))
    }
}

#[async_trait]
impl ProviderGateway for StripeGateway {
    async fn find_active_subscription(
        &self,
        tenant_id: &TenantId,
    ) -> BillingResult<Option<ProviderSubscription>> {
        let mut starting_after = None;

        for page in 0..self.stripe.config().max_pages {
            let params = ListSubscriptions {
                limit: Some(PAGE_SIZE),
                starting_after: starting_after.clone(),
                ..Default::default()
            };
            let list = self
                .stripe
                .read("list_subscriptions", || {
                    Subscription::list(self.stripe.inner(), &params)
                })
                .await?;

            if let Some(sub) = list
                .data
                .iter()
                .find(|sub| tenant_tag(&sub.metadata) == Some(tenant_id.as_str()))
            {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    subscription_id = %sub.id,
                    page,
                    "Found subscription for tenant"
                );
                return Ok(Some(map_subscription(sub, tenant_id.as_str())));
            }

            match list.data.last() {
                Some(last) if list.has_more => starting_after = Some(last.id.clone()),
                _ => return Ok(None),
            }
        }

        tracing::warn!(
            tenant_id = %tenant_id,
            max_pages = self.stripe.config().max_pages,
            "Stopped subscription scan at page bound"
        );
        Ok(None)
    }

    async fn get_product_metadata(
        &self,
        product_id: &str,
    ) -> BillingResult<Option<ProductMetadata>> {
        let id = product_id
            .parse::<ProductId>()
            .map_err(|e| BillingError::InvalidInput(format!("Invalid product ID: {}", e)))?;

        let product = match self
            .stripe
            .read("retrieve_product", || {
                Product::retrieve(self.stripe.inner(), &id, &[])
            })
            .await
        {
            Ok(product) => product,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let metadata: Option<stripe::Metadata> = product.metadata.into();
        Ok(Some(ProductMetadata::from_strings(
            metadata.unwrap_or_default().into_iter().collect(),
        )))
    }

    async fn get_invoices(
        &self,
        tenant_id: &TenantId,
        limit: usize,
    ) -> BillingResult<Vec<Invoice>> {
        let Some(customer) = self.find_customer(tenant_id, None).await? else {
            return Ok(Vec::new());
        };
        let customer_id = customer
            .id
            .parse::<stripe::CustomerId>()
            .map_err(|e| BillingError::Internal(format!("Invalid customer ID: {}", e)))?;

        let mut params = ListInvoices::new();
        params.customer = Some(customer_id);
        params.limit = Some(limit.clamp(1, PAGE_SIZE as usize) as u64);

        let list = self
            .stripe
            .read("list_invoices", || {
                StripeInvoice::list(self.stripe.inner(), &params)
            })
            .await?;

        let mut invoices: Vec<Invoice> = list.data.into_iter().map(map_invoice).collect();
        invoices.sort_by(|a, b| b.created.cmp(&a.created));
        invoices.truncate(limit);
        Ok(invoices)
    }

    async fn find_customer(
        &self,
        tenant_id: &TenantId,
        email: Option<&str>,
    ) -> BillingResult<Option<ProviderCustomer>> {
        let mut starting_after = None;

        for _ in 0..self.stripe.config().max_pages {
            let params = ListCustomers {
                email,
                limit: Some(PAGE_SIZE),
                starting_after: starting_after.clone(),
                ..Default::default()
            };
            let list = self
                .stripe
                .read("list_customers", || {
                    Customer::list(self.stripe.inner(), &params)
                })
                .await?;

            for customer in &list.data {
                let metadata: Option<stripe::Metadata> = customer.metadata.clone().into();
                let matches = metadata
                    .as_ref()
                    .and_then(tenant_tag)
                    .is_some_and(|tag| tag == tenant_id.as_str());
                if matches {
                    return Ok(Some(ProviderCustomer {
                        id: customer.id.to_string(),
                        email: customer.email.clone(),
                        tenant_id: tenant_id.to_string(),
                    }));
                }
            }

            match list.data.last() {
                Some(last) if list.has_more => starting_after = Some(last.id.clone()),
                _ => return Ok(None),
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use serde_json::{json, Value};

    fn gateway_with(server: &Server, max_retries: usize, max_pages: usize) -> StripeGateway {
        let mut config = StripeConfig::new("sk_test_planwise");
        config.api_base = Some(server.url());
        config.max_retries = max_retries;
        config.max_pages = max_pages;
        StripeGateway::from_config(config)
    }

    fn gateway(server: &Server) -> StripeGateway {
        gateway_with(server, 0, 10)
    }

    fn list(url: &str, data: Vec<Value>, has_more: bool) -> String {
        json!({"object": "list", "data": data, "has_more": has_more, "url": url}).to_string()
    }

    fn empty_list(url: &str) -> String {
        list(url, Vec::new(), false)
    }

    fn price(nickname: Option<&str>, interval: &str) -> Value {
        json!({
            "id": "price_1Q7P3sP1Q7ODTY3x54GP00jb",
            "object": "price",
            "nickname": nickname,
            "product": "prod_QsZcYAP5OuWzrr",
            "recurring": {"interval": interval, "interval_count": 1, "usage_type": "licensed"}
        })
    }

    fn subscription(id: &str, tenant: &str, item: Value) -> Value {
        json!({
            "id": id,
            "object": "subscription",
            "automatic_tax": {"enabled": false},
            "billing_cycle_anchor": 1_700_000_000,
            "cancel_at_period_end": false,
            "created": 1_700_000_000,
            "currency": "usd",
            "current_period_end": 1_800_000_000,
            "current_period_start": 1_700_000_000,
            "customer": "cus_planwise",
            "items": {
                "object": "list",
                "data": [item],
                "has_more": false,
                "url": format!("/v1/subscription_items?subscription={}", id)
            },
            "livemode": false,
            "metadata": {"tenant_id": tenant},
            "start_date": 1_700_000_000,
            "status": "active"
        })
    }

    fn team_item() -> Value {
        json!({
            "id": "si_team",
            "object": "subscription_item",
            "plan": {
                "id": "price_1Q7P3sP1Q7ODTY3x54GP00jb",
                "object": "plan",
                "nickname": "team",
                "interval": "year"
            },
            "price": price(Some("Team yearly"), "year")
        })
    }

    async fn subscriptions_mock(server: &mut ServerGuard, body: String) -> Mock {
        server
            .mock("GET", Matcher::Regex(r"^/v1/subscriptions".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_no_subscriptions_is_not_found() {
        let mut server = Server::new_async().await;
        let mock = subscriptions_mock(&mut server, empty_list("/v1/subscriptions")).await;

        let tenant = TenantId::new("tenant-1").unwrap();
        let result = gateway(&server).find_active_subscription(&tenant).await.unwrap();
        assert!(result.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_first_exact_tenant_match_wins() {
        let mut server = Server::new_async().await;
        let body = list(
            "/v1/subscriptions",
            vec![
                subscription("sub_near_miss", "tenant-10", team_item()),
                subscription("sub_case", "Tenant-1", team_item()),
                subscription("sub_first", "tenant-1", team_item()),
                subscription("sub_second", "tenant-1", team_item()),
            ],
            false,
        );
        let mock = subscriptions_mock(&mut server, body).await;

        let tenant = TenantId::new("tenant-1").unwrap();
        let found = gateway(&server)
            .find_active_subscription(&tenant)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, "sub_first");
        assert_eq!(found.tenant_id, "tenant-1");
        assert_eq!(found.status, "active");
        assert_eq!(found.plan_name.as_deref(), Some("team"));
        assert_eq!(found.interval.as_deref(), Some("year"));
        assert_eq!(found.price_id.as_deref(), Some("price_1Q7P3sP1Q7ODTY3x54GP00jb"));
        assert_eq!(found.product_id.as_deref(), Some("prod_QsZcYAP5OuWzrr"));
        assert_eq!(found.customer_id.as_deref(), Some("cus_planwise"));
        assert_eq!(
            found.current_period_end,
            OffsetDateTime::from_unix_timestamp(1_800_000_000).ok()
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_price_nickname_and_recurring_interval_used_without_plan() {
        let mut server = Server::new_async().await;
        let item = json!({
            "id": "si_pro",
            "object": "subscription_item",
            "price": price(Some("professional"), "month")
        });
        let body = list(
            "/v1/subscriptions",
            vec![subscription("sub_pro", "tenant-1", item)],
            false,
        );
        let _mock = subscriptions_mock(&mut server, body).await;

        let tenant = TenantId::new("tenant-1").unwrap();
        let found = gateway(&server)
            .find_active_subscription(&tenant)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.plan_name.as_deref(), Some("professional"));
        assert_eq!(found.interval.as_deref(), Some("month"));
    }

    #[tokio::test]
    async fn test_scan_follows_next_page() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", Matcher::Regex(r"^/v1/subscriptions".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(list(
                "/v1/subscriptions",
                vec![subscription("sub_page_one", "tenant-2", team_item())],
                true,
            ))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock(
                "GET",
                Matcher::Regex(r"^/v1/subscriptions\?.*starting_after=sub_page_one".to_string()),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(list(
                "/v1/subscriptions",
                vec![subscription("sub_page_two", "tenant-1", team_item())],
                false,
            ))
            .expect(1)
            .create_async()
            .await;

        let tenant = TenantId::new("tenant-1").unwrap();
        let found = gateway(&server)
            .find_active_subscription(&tenant)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, "sub_page_two");
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_scan_stops_at_page_bound() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/v1/subscriptions".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(list(
                "/v1/subscriptions",
                vec![subscription("sub_other", "tenant-2", team_item())],
                true,
            ))
            .expect(2)
            .create_async()
            .await;

        let tenant = TenantId::new("tenant-1").unwrap();
        let result = gateway_with(&server, 0, 2)
            .find_active_subscription(&tenant)
            .await
            .unwrap();

        assert!(result.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let mut server = Server::new_async().await;
        let rate_limited = server
            .mock("GET", Matcher::Regex(r"^/v1/subscriptions".to_string()))
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"type":"rate_limit_error","message":"slow down"}}"#)
            .expect(1)
            .create_async()
            .await;
        let server_error = server
            .mock("GET", Matcher::Regex(r"^/v1/subscriptions".to_string()))
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"type":"api_error","message":"try again"}}"#)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", Matcher::Regex(r"^/v1/subscriptions".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(empty_list("/v1/subscriptions"))
            .expect(1)
            .create_async()
            .await;

        let tenant = TenantId::new("tenant-1").unwrap();
        let result = gateway_with(&server, 2, 10)
            .find_active_subscription(&tenant)
            .await
            .unwrap();

        assert!(result.is_none());
        rate_limited.assert_async().await;
        server_error.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/v1/subscriptions".to_string()))
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"type":"api_error","message":"boom"}}"#)
            .expect(1)
            .create_async()
            .await;

        let tenant = TenantId::new("tenant-1").unwrap();
        let err = gateway(&server)
            .find_active_subscription(&tenant)
            .await
            .unwrap_err();
        assert!(err.is_provider_unavailable());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_product_metadata_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/v1/products/prod_QsZcYAP5OuWzrr".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "prod_QsZcYAP5OuWzrr",
                    "object": "product",
                    "metadata": {"apps_limit": "200", "can_replace_logo": "true"}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let metadata = gateway(&server)
            .get_product_metadata("prod_QsZcYAP5OuWzrr")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(metadata.get("apps_limit"), Some(&json!("200")));
        assert_eq!(metadata.get("can_replace_logo"), Some(&json!("true")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/v1/products/prod_missing".to_string()))
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"error": {
                    "type": "invalid_request_error",
                    "message": "No such product: 'prod_missing'"
                }})
                .to_string(),
            )
            .create_async()
            .await;

        let result = gateway(&server)
            .get_product_metadata("prod_missing")
            .await
            .unwrap();
        assert!(result.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unauthorized_is_unavailable_and_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/v1/products/prod_x".to_string()))
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"type":"invalid_request_error","message":"Invalid API Key"}}"#)
            .expect(1)
            .create_async()
            .await;

        let err = gateway_with(&server, 2, 10)
            .get_product_metadata("prod_x")
            .await
            .unwrap_err();
        assert!(err.is_provider_unavailable());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_find_customer_matches_tenant_tag() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/v1/customers".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(list(
                "/v1/customers",
                vec![
                    json!({"id": "cus_untagged", "object": "customer", "metadata": {}}),
                    json!({
                        "id": "cus_other",
                        "object": "customer",
                        "metadata": {"tenant_id": "tenant-10"}
                    }),
                    json!({
                        "id": "cus_owner",
                        "object": "customer",
                        "email": "owner@example.com",
                        "metadata": {"tenant_id": "tenant-1"}
                    }),
                ],
                false,
            ))
            .create_async()
            .await;

        let tenant = TenantId::new("tenant-1").unwrap();
        let customer = gateway(&server)
            .find_customer(&tenant, None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(customer.id, "cus_owner");
        assert_eq!(customer.email.as_deref(), Some("owner@example.com"));
        assert_eq!(customer.tenant_id, "tenant-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_customer_means_no_invoices() {
        let mut server = Server::new_async().await;
        let _customers = server
            .mock("GET", Matcher::Regex(r"^/v1/customers".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(empty_list("/v1/customers"))
            .create_async()
            .await;
        let invoices = server
            .mock("GET", Matcher::Regex(r"^/v1/invoices".to_string()))
            .expect(0)
            .create_async()
            .await;

        let tenant = TenantId::new("tenant-1").unwrap();
        let result = gateway(&server).get_invoices(&tenant, 10).await.unwrap();
        assert!(result.is_empty());
        invoices.assert_async().await;
    }

    #[test]
    fn test_retry_classification() {
        assert!(is_retryable(&StripeError::Timeout));
        assert!(!is_retryable(&StripeError::ClientError("bad".to_string())));
    }
}
