//! Workspace billing summary route

use axum::extract::{Path, State};
use axum::Json;

use planwise_billing::WorkspaceBillingSummary;

use crate::error::ApiResult;
use crate::routes::parse_tenant;
use crate::state::AppState;

/// GET /api/tenants/{tenant_id}/workspace
///
/// Always answers 200; a billing failure is reported inside the summary.
pub async fn get_workspace(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<WorkspaceBillingSummary>> {
    let tenant_id = parse_tenant(tenant_id)?;
    Ok(Json(state.billing.workspace_summary(&tenant_id).await))
}
