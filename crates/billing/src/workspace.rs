//! Workspace billing summary shown on the console's workspace page

use serde::{Deserialize, Serialize};

use planwise_shared::{FeatureSet, FlagKind, TenantId};

use crate::error::BillingResult;

pub const SYNC_FAILED_MESSAGE: &str = "failed to synchronize with billing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceBillingSummary {
    pub tenant_id: String,
    /// Plan name, or `"unknown"` when billing could not be reached
    pub plan: String,
    pub status: WorkspaceStatus,
    pub can_replace_logo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WorkspaceBillingSummary {
    pub fn from_resolution(tenant_id: &TenantId, resolution: &BillingResult<FeatureSet>) -> Self {
        match resolution {
            Ok(features) => Self {
                tenant_id: tenant_id.to_string(),
                plan: features.plan.to_string(),
                status: if features.billing_enabled {
                    WorkspaceStatus::Active
                } else {
                    WorkspaceStatus::Inactive
                },
                can_replace_logo: features.flag(FlagKind::CanReplaceLogo),
                error_message: None,
            },
            Err(e) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Workspace billing summary degraded"
                );
                Self {
                    tenant_id: tenant_id.to_string(),
                    plan: "unknown".to_string(),
                    status: WorkspaceStatus::Inactive,
                    can_replace_logo: false,
                    error_message: Some(SYNC_FAILED_MESSAGE.to_string()),
                }
            }
        }
    }
}
