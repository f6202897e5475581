//! Common types used across Planwise

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Tenant (workspace) identifier.
///
/// Compared by exact string equality against the `tenant_id` metadata tag the
/// billing provider stores on subscriptions and customers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tenant id must not be empty")]
pub struct InvalidTenantId;

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidTenantId> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InvalidTenantId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TenantId {
    type Err = InvalidTenantId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Named plan tier
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    #[default]
    Sandbox,
    Professional,
    Team,
    Enterprise,
}

/// Returned when a plan or interval name is not one of the enumerated values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl PlanId {
    pub const ALL: [PlanId; 4] = [
        PlanId::Sandbox,
        PlanId::Professional,
        PlanId::Team,
        PlanId::Enterprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Sandbox => "sandbox",
            PlanId::Professional => "professional",
            PlanId::Team => "team",
            PlanId::Enterprise => "enterprise",
        }
    }
}

impl FromStr for PlanId {
    type Err = UnknownVariant;

    /// Case-insensitive, ignores surrounding whitespace
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        PlanId::ALL
            .into_iter()
            .find(|plan| plan.as_str() == normalized)
            .ok_or_else(|| UnknownVariant {
                kind: "plan",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Billing interval
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    Month,
    Year,
}

impl Interval {
    pub const ALL: [Interval; 2] = [Interval::Month, Interval::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Month => "month",
            Interval::Year => "year",
        }
    }
}

impl FromStr for Interval {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(Interval::Month),
            "year" => Ok(Interval::Year),
            _ => Err(UnknownVariant {
                kind: "interval",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource limits tracked per tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Members,
    Apps,
    VectorSpace,
    AnnotationQuota,
    DocumentsUploadQuota,
}

impl LimitKind {
    pub const ALL: [LimitKind; 5] = [
        LimitKind::Members,
        LimitKind::Apps,
        LimitKind::VectorSpace,
        LimitKind::AnnotationQuota,
        LimitKind::DocumentsUploadQuota,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Members => "members",
            LimitKind::Apps => "apps",
            LimitKind::VectorSpace => "vector_space",
            LimitKind::AnnotationQuota => "annotation_quota",
            LimitKind::DocumentsUploadQuota => "documents_upload_quota",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean feature switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    CanReplaceLogo,
    ModelLoadBalancingEnabled,
    DatasetOperatorEnabled,
}

impl FlagKind {
    pub const ALL: [FlagKind; 3] = [
        FlagKind::CanReplaceLogo,
        FlagKind::ModelLoadBalancingEnabled,
        FlagKind::DatasetOperatorEnabled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagKind::CanReplaceLogo => "can_replace_logo",
            FlagKind::ModelLoadBalancingEnabled => "model_load_balancing_enabled",
            FlagKind::DatasetOperatorEnabled => "dataset_operator_enabled",
        }
    }
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Document processing tiers
// =============================================================================

pub const DEFAULT_DOCS_TIER: &str = "standard";

pub const KNOWN_DOCS_TIERS: [&str; 3] = ["standard", "priority", "top-priority"];

pub fn is_known_docs_tier(tier: &str) -> bool {
    KNOWN_DOCS_TIERS.contains(&tier)
}

// =============================================================================
// Entitlements
// =============================================================================

/// Sentinel used by the plan table for "no practical limit"
pub const UNLIMITED: u64 = 99_999_999;

/// Usage against a maximum. `used` may exceed `max` after a downgrade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub used: u64,
    pub max: u64,
}

impl Limit {
    pub fn new(used: u64, max: u64) -> Self {
        Self { used, max }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max >= UNLIMITED
    }
}

/// Entitlement snapshot for one tenant.
///
/// Built by `planwise_billing::normalize`, which guarantees that every
/// [`LimitKind`] and [`FlagKind`] is present. Never mutated after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub billing_enabled: bool,
    pub plan: PlanId,
    pub interval: Interval,
    pub limits: BTreeMap<LimitKind, Limit>,
    pub docs_processing_tier: String,
    pub flags: BTreeMap<FlagKind, bool>,
}

impl FeatureSet {
    pub fn limit(&self, kind: LimitKind) -> Limit {
        self.limits.get(&kind).copied().unwrap_or_default()
    }

    pub fn flag(&self, kind: FlagKind) -> bool {
        self.flags.get(&kind).copied().unwrap_or(false)
    }

    /// True when every limit and flag key is present
    pub fn is_complete(&self) -> bool {
        LimitKind::ALL.iter().all(|k| self.limits.contains_key(k))
            && FlagKind::ALL.iter().all(|k| self.flags.contains_key(k))
    }
}

/// Deployment-wide SSO entitlements, sourced from the enterprise service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemFeatureSet {
    pub sso_enforced_for_signin: bool,
    pub sso_enforced_for_signin_protocol: String,
    pub sso_enforced_for_web: bool,
    pub sso_enforced_for_web_protocol: String,
    pub enable_web_sso_switch_component: bool,
}
