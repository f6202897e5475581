//! Feature and entitlement routes

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use planwise_shared::{FeatureSet, FlagKind, Interval, Limit, LimitKind, PlanId, SystemFeatureSet};

use crate::error::ApiResult;
use crate::routes::parse_tenant;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubscriptionModel {
    pub plan: PlanId,
    pub interval: Interval,
}

#[derive(Debug, Serialize)]
pub struct BillingModel {
    pub enabled: bool,
    pub subscription: SubscriptionModel,
}

/// Usage against a limit, as the console reads it
#[derive(Debug, Serialize)]
pub struct LimitationModel {
    pub size: u64,
    pub limit: u64,
}

impl From<Limit> for LimitationModel {
    fn from(limit: Limit) -> Self {
        Self {
            size: limit.used,
            limit: limit.max,
        }
    }
}

/// Feature set in the shape the console consumes
#[derive(Debug, Serialize)]
pub struct ConsoleFeatures {
    pub billing: BillingModel,
    pub members: LimitationModel,
    pub apps: LimitationModel,
    pub vector_space: LimitationModel,
    pub annotation_quota_limit: LimitationModel,
    pub documents_upload_quota: LimitationModel,
    pub docs_processing: String,
    pub can_replace_logo: bool,
    pub model_load_balancing_enabled: bool,
    pub dataset_operator_enabled: bool,
}

impl From<FeatureSet> for ConsoleFeatures {
    fn from(set: FeatureSet) -> Self {
        Self {
            billing: BillingModel {
                enabled: set.billing_enabled,
                subscription: SubscriptionModel {
                    plan: set.plan,
                    interval: set.interval,
                },
            },
            members: set.limit(LimitKind::Members).into(),
            apps: set.limit(LimitKind::Apps).into(),
            vector_space: set.limit(LimitKind::VectorSpace).into(),
            annotation_quota_limit: set.limit(LimitKind::AnnotationQuota).into(),
            documents_upload_quota: set.limit(LimitKind::DocumentsUploadQuota).into(),
            can_replace_logo: set.flag(FlagKind::CanReplaceLogo),
            model_load_balancing_enabled: set.flag(FlagKind::ModelLoadBalancingEnabled),
            dataset_operator_enabled: set.flag(FlagKind::DatasetOperatorEnabled),
            docs_processing: set.docs_processing_tier,
        }
    }
}

/// GET /api/tenants/{tenant_id}/features
pub async fn get_features(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<ConsoleFeatures>> {
    let tenant_id = parse_tenant(tenant_id)?;
    let features = state.billing.resolve(&tenant_id).await?;
    Ok(Json(features.into()))
}

/// GET /api/tenants/{tenant_id}/entitlements
pub async fn get_entitlements(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<FeatureSet>> {
    let tenant_id = parse_tenant(tenant_id)?;
    Ok(Json(state.billing.resolve(&tenant_id).await?))
}

/// GET /api/system-features
pub async fn get_system_features(
    State(state): State<AppState>,
) -> ApiResult<Json<SystemFeatureSet>> {
    Ok(Json(state.billing.get_system_entitlements().await?))
}
