//! Subscription and invoice routes

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use planwise_billing::{Invoice, SubscriptionSummary};
use planwise_shared::{Interval, PlanId};

use crate::error::{ApiError, ApiResult};
use crate::routes::parse_tenant;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    pub plan: Option<String>,
    pub interval: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvoicesQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct InvoicesResponse {
    pub invoices: Vec<Invoice>,
}

/// Only paid, self-serve plans can be asked for by name
fn parse_plan_filter(raw: Option<&str>) -> ApiResult<Option<PlanId>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<PlanId>() {
        Ok(plan @ (PlanId::Professional | PlanId::Team)) => Ok(Some(plan)),
        _ => Err(ApiError::BadRequest(format!(
            "plan must be one of professional, team (got '{}')",
            raw
        ))),
    }
}

fn parse_interval_filter(raw: Option<&str>) -> ApiResult<Option<Interval>> {
    raw.map(|raw| {
        raw.parse::<Interval>().map_err(|_| {
            ApiError::BadRequest(format!("interval must be one of month, year (got '{}')", raw))
        })
    })
    .transpose()
}

/// Subscription and invoice reads only exist while billing is switched on
fn require_billing(state: &AppState) -> ApiResult<()> {
    if state.config.billing.billing_enabled {
        Ok(())
    } else {
        Err(ApiError::NotFound("Billing is not enabled".to_string()))
    }
}

/// GET /api/tenants/{tenant_id}/billing/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(query): Query<SubscriptionQuery>,
) -> ApiResult<Json<SubscriptionSummary>> {
    require_billing(&state)?;
    let tenant_id = parse_tenant(tenant_id)?;
    let plan = parse_plan_filter(query.plan.as_deref())?;
    let interval = parse_interval_filter(query.interval.as_deref())?;

    let summary = state
        .billing
        .subscriptions
        .get_subscription(&tenant_id, plan, interval)
        .await?;
    Ok(Json(summary))
}

/// GET /api/tenants/{tenant_id}/billing/invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(query): Query<InvoicesQuery>,
) -> ApiResult<Json<InvoicesResponse>> {
    require_billing(&state)?;
    let tenant_id = parse_tenant(tenant_id)?;
    let invoices = state
        .billing
        .subscriptions
        .list_invoices(&tenant_id, query.limit)
        .await?;
    tracing::debug!(tenant_id = %tenant_id, count = invoices.len(), "Listed invoices");
    Ok(Json(InvoicesResponse { invoices }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use planwise_billing::{GatewayOperation, InMemoryGateway, ProviderSubscription};

    use crate::routes::test_support::{app, get_json};

    fn professional_monthly() -> ProviderSubscription {
        ProviderSubscription {
            id: "sub_pro".to_string(),
            status: "active".to_string(),
            tenant_id: "t1".to_string(),
            plan_name: Some("professional".to_string()),
            interval: Some("month".to_string()),
            price_id: None,
            product_id: None,
            customer_id: Some("cus_1".to_string()),
            current_period_end: None,
        }
    }

    #[test]
    fn test_plan_filter() {
        assert_eq!(parse_plan_filter(None).unwrap(), None);
        assert_eq!(
            parse_plan_filter(Some("Team")).unwrap(),
            Some(PlanId::Team)
        );
        assert!(parse_plan_filter(Some("sandbox")).is_err());
        assert!(parse_plan_filter(Some("enterprise")).is_err());
        assert!(parse_interval_filter(Some("week")).is_err());
    }

    #[tokio::test]
    async fn test_subscription_found() {
        let gateway = InMemoryGateway::new().with_subscription(professional_monthly());
        let (status, body) = get_json(
            app(gateway, true, None),
            "/api/tenants/t1/billing/subscription?plan=professional&interval=month",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "sub_pro");
        assert_eq!(body["plan"], "professional");
    }

    #[tokio::test]
    async fn test_subscription_mismatch_is_404() {
        let gateway = InMemoryGateway::new().with_subscription(professional_monthly());
        let (status, body) = get_json(
            app(gateway, true, None),
            "/api/tenants/t1/billing/subscription?plan=team",
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_invalid_plan_query_is_400() {
        let (status, _) = get_json(
            app(InMemoryGateway::new(), true, None),
            "/api/tenants/t1/billing/subscription?plan=gold",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invoices_unavailable_is_503() {
        let gateway = InMemoryGateway::new().failing(GatewayOperation::GetInvoices);
        let (status, _) = get_json(
            app(gateway, true, None),
            "/api/tenants/t1/billing/invoices?limit=5",
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_billing_disabled_hides_billing_reads() {
        let gateway = InMemoryGateway::new().with_subscription(professional_monthly());
        let (status, body) = get_json(
            app(gateway, false, None),
            "/api/tenants/t1/billing/subscription",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let gateway = InMemoryGateway::new().failing(GatewayOperation::GetInvoices);
        let (status, _) =
            get_json(app(gateway, false, None), "/api/tenants/t1/billing/invoices").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invoices_empty() {
        let (status, body) = get_json(
            app(InMemoryGateway::new(), true, None),
            "/api/tenants/t1/billing/invoices",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["invoices"], serde_json::json!([]));
    }
}
