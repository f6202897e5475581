//! Deployment-wide (system) entitlements
//!
//! SSO enforcement settings are owned by the enterprise service, not by
//! the billing provider. Outside enterprise mode every value is default.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use planwise_shared::SystemFeatureSet;

use crate::config::EnterpriseConfig;
use crate::error::{BillingError, BillingResult};

/// Header carrying the shared secret expected by the enterprise service
pub const ENTERPRISE_SECRET_HEADER: &str = "Enterprise-Api-Secret-Key";

/// SSO settings reported by the enterprise service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterpriseInfo {
    pub sso_enforced_for_signin: bool,
    pub sso_enforced_for_signin_protocol: String,
    pub sso_enforced_for_web: bool,
    pub sso_enforced_for_web_protocol: String,
}

#[async_trait]
pub trait EnterpriseInfoSource: Send + Sync {
    async fn get_info(&self) -> BillingResult<EnterpriseInfo>;
}

/// Enterprise service reached over HTTP
pub struct HttpEnterpriseInfo {
    client: reqwest::Client,
    config: EnterpriseConfig,
}

impl HttpEnterpriseInfo {
    pub fn new(config: EnterpriseConfig, timeout: Duration) -> BillingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BillingError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn info_url(&self) -> String {
        format!("{}/info", self.config.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl EnterpriseInfoSource for HttpEnterpriseInfo {
    async fn get_info(&self) -> BillingResult<EnterpriseInfo> {
        let response = self
            .client
            .get(self.info_url())
            .header(ENTERPRISE_SECRET_HEADER, &self.config.secret_key)
            .send()
            .await
            .map_err(|e| {
                BillingError::EnterpriseUnavailable(format!("Failed to call enterprise API: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                error_body = %error_body,
                "Enterprise info request failed"
            );
            return Err(BillingError::EnterpriseUnavailable(format!(
                "Enterprise API error ({})",
                status
            )));
        }

        response.json::<EnterpriseInfo>().await.map_err(|e| {
            BillingError::EnterpriseUnavailable(format!(
                "Failed to parse enterprise response: {}",
                e
            ))
        })
    }
}

/// Fixed answer, for tests and local development
#[derive(Debug, Clone, Default)]
pub struct StaticEnterpriseInfo(pub Option<EnterpriseInfo>);

#[async_trait]
impl EnterpriseInfoSource for StaticEnterpriseInfo {
    async fn get_info(&self) -> BillingResult<EnterpriseInfo> {
        self.0.clone().ok_or_else(|| {
            BillingError::EnterpriseUnavailable("enterprise service not configured".to_string())
        })
    }
}

pub struct SystemFeatureService {
    enterprise_enabled: bool,
    source: Arc<dyn EnterpriseInfoSource>,
}

impl SystemFeatureService {
    pub fn new(enterprise_enabled: bool, source: Arc<dyn EnterpriseInfoSource>) -> Self {
        Self {
            enterprise_enabled,
            source,
        }
    }

    /// System entitlements. Defaults without contacting anything unless
    /// enterprise mode is on.
    pub async fn get_system_entitlements(&self) -> BillingResult<SystemFeatureSet> {
        if !self.enterprise_enabled {
            return Ok(SystemFeatureSet::default());
        }

        let info = self.source.get_info().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to load enterprise info");
            match e {
                BillingError::EnterpriseUnavailable(_) => e,
                other => BillingError::EnterpriseUnavailable(other.to_string()),
            }
        })?;

        Ok(SystemFeatureSet {
            sso_enforced_for_signin: info.sso_enforced_for_signin,
            sso_enforced_for_signin_protocol: info.sso_enforced_for_signin_protocol,
            sso_enforced_for_web: info.sso_enforced_for_web,
            sso_enforced_for_web_protocol: info.sso_enforced_for_web_protocol,
            enable_web_sso_switch_component: true,
        })
    }
}
