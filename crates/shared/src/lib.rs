// Test code patterns:
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Planwise shared types
//!
//! Value types describing plans, intervals, limits and flags. No I/O lives
//! here; the billing crate resolves these from the provider.

pub mod env;
pub mod types;

pub use env::{env_flag, env_parse, env_string, parse_bool};
pub use types::{
    is_known_docs_tier, FeatureSet, FlagKind, Interval, InvalidTenantId, Limit, LimitKind, PlanId,
    SystemFeatureSet, TenantId, UnknownVariant, DEFAULT_DOCS_TIER, KNOWN_DOCS_TIERS, UNLIMITED,
};
