//! Normalization of draft entitlements
//!
//! A [`FeatureDraft`] is whatever could be assembled from provider data:
//! possibly negative numbers, unknown tiers, missing keys. [`normalize`]
//! turns any draft into a complete [`FeatureSet`] and never fails.

use std::collections::BTreeMap;

use serde_json::Value;

use planwise_shared::{
    is_known_docs_tier, FeatureSet, FlagKind, Interval, Limit, LimitKind, PlanId,
    DEFAULT_DOCS_TIER,
};

use crate::catalog::DefaultEntitlements;
use crate::coerce::{parse_count, parse_flag, parse_text, report_malformed};
use crate::invariants::{is_valid, run_all_checks, ViolationSeverity};

/// Limit as found in provider data; `None` means the value was absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DraftLimit {
    pub used: Option<i64>,
    pub max: Option<i64>,
}

impl DraftLimit {
    pub fn new(used: i64, max: i64) -> Self {
        Self {
            used: Some(used),
            max: Some(max),
        }
    }
}

/// Partially validated entitlement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureDraft {
    pub billing_enabled: bool,
    pub plan: PlanId,
    pub interval: Interval,
    pub limits: BTreeMap<LimitKind, DraftLimit>,
    pub docs_processing_tier: Option<String>,
    pub flags: BTreeMap<FlagKind, bool>,
}

impl FeatureDraft {
    /// Lenient reading of an arbitrary JSON value.
    ///
    /// Accepts the serialized [`FeatureSet`] shape; every field is optional
    /// and anything unreadable is dropped so that normalization fills it.
    /// Non-objects yield an empty draft.
    pub fn from_json(value: &Value) -> Self {
        let mut draft = Self::default();
        let Some(object) = value.as_object() else {
            return draft;
        };

        if let Some(enabled) = object.get("billing_enabled").and_then(parse_flag) {
            draft.billing_enabled = enabled;
        }
        if let Some(raw) = object.get("plan") {
            draft.plan = parse_text(raw)
                .and_then(|name| name.parse().ok())
                .unwrap_or_else(|| {
                    report_malformed("plan", raw, PlanId::default().as_str());
                    PlanId::default()
                });
        }
        if let Some(raw) = object.get("interval") {
            draft.interval = parse_text(raw)
                .and_then(|name| name.parse().ok())
                .unwrap_or_else(|| {
                    report_malformed("interval", raw, Interval::default().as_str());
                    Interval::default()
                });
        }

        if let Some(limits) = object.get("limits").and_then(Value::as_object) {
            for kind in LimitKind::ALL {
                let Some(entry) = limits.get(kind.as_str()) else {
                    continue;
                };
                let read = |part: &str| {
                    let raw = entry.get(part)?;
                    let count = parse_count(raw);
                    if count.is_none() {
                        report_malformed(&format!("limits.{}.{}", kind, part), raw, "default");
                    }
                    count
                };
                let limit = DraftLimit {
                    used: read("used"),
                    max: read("max"),
                };
                draft.limits.insert(kind, limit);
            }
        }

        draft.docs_processing_tier = object.get("docs_processing_tier").and_then(parse_text);

        if let Some(flags) = object.get("flags").and_then(Value::as_object) {
            for kind in FlagKind::ALL {
                let Some(raw) = flags.get(kind.as_str()) else {
                    continue;
                };
                match parse_flag(raw) {
                    Some(value) => {
                        draft.flags.insert(kind, value);
                    }
                    None => report_malformed(&format!("flags.{}", kind), raw, "default"),
                }
            }
        }

        draft
    }
}

/// Turn any draft into a complete, valid [`FeatureSet`].
///
/// - negative `used`/`max` are clamped to 0
/// - a tier outside the known set becomes `"standard"`
/// - missing limit maxima, tiers and flags come from `defaults`; missing
///   usage is 0
pub fn normalize(draft: FeatureDraft, defaults: &DefaultEntitlements) -> FeatureSet {
    let summary = run_all_checks(&draft);
    if !summary.healthy {
        tracing::debug!(
            plan = %draft.plan,
            checks_run = summary.checks_run,
            checks_failed = summary.checks_failed,
            "Draft entitlement needs correction"
        );
    }
    for violation in summary.violations {
        match violation.severity {
            ViolationSeverity::High | ViolationSeverity::Medium => tracing::warn!(
                invariant = %violation.invariant,
                field = %violation.field,
                severity = %violation.severity,
                "{}",
                violation.description
            ),
            ViolationSeverity::Low => tracing::debug!(
                invariant = %violation.invariant,
                field = %violation.field,
                "{}",
                violation.description
            ),
        }
    }

    let limits = LimitKind::ALL
        .into_iter()
        .map(|kind| {
            let draft_limit = draft.limits.get(&kind).copied().unwrap_or_default();
            let used = draft_limit.used.map(clamp).unwrap_or(0);
            let max = draft_limit.max.map(clamp).unwrap_or_else(|| defaults.max(kind));
            (kind, Limit::new(used, max))
        })
        .collect();

    let docs_processing_tier = match draft.docs_processing_tier {
        Some(tier) if is_known_docs_tier(&tier) => tier,
        None if is_known_docs_tier(&defaults.docs_processing_tier) => {
            defaults.docs_processing_tier.clone()
        }
        _ => DEFAULT_DOCS_TIER.to_string(),
    };

    let flags = FlagKind::ALL
        .into_iter()
        .map(|kind| {
            let value = draft
                .flags
                .get(&kind)
                .copied()
                .unwrap_or_else(|| defaults.flag(kind));
            (kind, value)
        })
        .collect();

    let set = FeatureSet {
        billing_enabled: draft.billing_enabled,
        plan: draft.plan,
        interval: draft.interval,
        limits,
        docs_processing_tier,
        flags,
    };
    debug_assert!(is_valid(&set));
    set
}

fn clamp(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
