//! Entitlement invariants
//!
//! Runnable checks over a draft entitlement before normalization. Each
//! violation names the invariant and field so the correction that
//! `normalize` applies can be logged and traced back to provider data.
//!
//! Checks only read; correcting is `normalize`'s job.

use serde::{Deserialize, Serialize};

use planwise_shared::{is_known_docs_tier, FeatureSet, FlagKind, LimitKind};

use crate::normalize::FeatureDraft;

/// Result of running a single invariant check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Field the violation was found on
    pub field: String,
    /// Human-readable description of the violation
    pub description: String,
    pub severity: ViolationSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Value was out of range and had to be clamped
    High,
    /// Value was unknown and replaced with a default
    Medium,
    /// Value was absent and filled from plan defaults
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Summary of all invariant checks over one draft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

pub fn available_checks() -> Vec<&'static str> {
    vec![
        "limits_non_negative",
        "limit_keys_complete",
        "flag_keys_complete",
        "docs_tier_known",
    ]
}

/// Every violation found in a draft, in check order
pub fn check_feature_draft(draft: &FeatureDraft) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    violations.extend(check_limits_non_negative(draft));
    violations.extend(check_limit_keys_complete(draft));
    violations.extend(check_flag_keys_complete(draft));
    violations.extend(check_docs_tier_known(draft));
    violations
}

/// Run all invariant checks over a draft
pub fn run_all_checks(draft: &FeatureDraft) -> InvariantCheckSummary {
    let violations = check_feature_draft(draft);

    let checks_run = available_checks().len();
    let checks_failed = violations
        .iter()
        .map(|v| &v.invariant)
        .collect::<std::collections::HashSet<_>>()
        .len();

    InvariantCheckSummary {
        checks_run,
        checks_passed: checks_run - checks_failed,
        checks_failed,
        healthy: violations.is_empty(),
        violations,
    }
}

/// Invariant 1: limits are never negative
fn check_limits_non_negative(draft: &FeatureDraft) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    for (kind, limit) in &draft.limits {
        for (part, value) in [("used", limit.used), ("max", limit.max)] {
            if let Some(v) = value.filter(|v| *v < 0) {
                violations.push(InvariantViolation {
                    invariant: "limits_non_negative".to_string(),
                    field: format!("limits.{}.{}", kind, part),
                    description: format!("{} {} is negative ({})", kind, part, v),
                    severity: ViolationSeverity::High,
                });
            }
        }
    }
    violations
}

/// Invariant 2: every limit kind carries a maximum
fn check_limit_keys_complete(draft: &FeatureDraft) -> Vec<InvariantViolation> {
    LimitKind::ALL
        .iter()
        .filter(|kind| draft.limits.get(kind).and_then(|l| l.max).is_none())
        .map(|kind| InvariantViolation {
            invariant: "limit_keys_complete".to_string(),
            field: format!("limits.{}", kind),
            description: format!("No maximum for {}", kind),
            severity: ViolationSeverity::Low,
        })
        .collect()
}

/// Invariant 3: every flag kind is present
fn check_flag_keys_complete(draft: &FeatureDraft) -> Vec<InvariantViolation> {
    FlagKind::ALL
        .iter()
        .filter(|kind| !draft.flags.contains_key(kind))
        .map(|kind| InvariantViolation {
            invariant: "flag_keys_complete".to_string(),
            field: format!("flags.{}", kind),
            description: format!("No value for flag {}", kind),
            severity: ViolationSeverity::Low,
        })
        .collect()
}

/// Invariant 4: docs processing tier is a known tier
fn check_docs_tier_known(draft: &FeatureDraft) -> Vec<InvariantViolation> {
    match draft.docs_processing_tier.as_deref() {
        Some(tier) if !is_known_docs_tier(tier) => vec![InvariantViolation {
            invariant: "docs_tier_known".to_string(),
            field: "docs_processing_tier".to_string(),
            description: format!("Unknown docs processing tier '{}'", tier),
            severity: ViolationSeverity::Medium,
        }],
        _ => vec![],
    }
}

/// Whether a resolved set satisfies every invariant
pub fn is_valid(set: &FeatureSet) -> bool {
    set.is_complete() && is_known_docs_tier(&set.docs_processing_tier)
}
