//! HTTP routes

pub mod billing;
pub mod features;
pub mod health;
pub mod workspace;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use planwise_shared::TenantId;

use crate::error::ApiError;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/system-features", get(features::get_system_features))
        .route(
            "/api/tenants/{tenant_id}/features",
            get(features::get_features),
        )
        .route(
            "/api/tenants/{tenant_id}/entitlements",
            get(features::get_entitlements),
        )
        .route(
            "/api/tenants/{tenant_id}/workspace",
            get(workspace::get_workspace),
        )
        .route(
            "/api/tenants/{tenant_id}/billing/subscription",
            get(billing::get_subscription),
        )
        .route(
            "/api/tenants/{tenant_id}/billing/invoices",
            get(billing::list_invoices),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn parse_tenant(raw: String) -> Result<TenantId, ApiError> {
    TenantId::new(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use tower::ServiceExt;

    use planwise_billing::{
        BillingConfig, BillingService, EnterpriseInfo, InMemoryGateway, NoUsage, PlanCatalog,
        StaticEnterpriseInfo,
    };

    use crate::config::{Config, LogFormat};
    use crate::state::AppState;

    pub fn app(
        gateway: InMemoryGateway,
        billing_enabled: bool,
        enterprise: Option<EnterpriseInfo>,
    ) -> Router {
        let billing_config = BillingConfig {
            billing_enabled,
            enterprise_enabled: enterprise.is_some(),
            ..BillingConfig::default()
        };
        let billing = BillingService::new(
            &billing_config,
            Arc::new(gateway),
            Arc::new(PlanCatalog::builtin()),
            Arc::new(StaticEnterpriseInfo(enterprise)),
            Arc::new(NoUsage),
        );
        let config = Config {
            bind_addr: ([127, 0, 0, 1], 0).into(),
            log_format: LogFormat::Pretty,
            billing: billing_config,
        };
        super::create_router(AppState::new(config, billing))
    }

    pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }
}
