//! Plan catalog
//!
//! Immutable table mapping each [`PlanId`] to its provider product, its
//! monthly/yearly prices and the entitlements applied whenever the provider
//! has nothing better to offer. Constructed once at startup and shared
//! behind an `Arc`.

use std::collections::BTreeMap;

use serde_json::Value;

use planwise_shared::{env_flag, env_string, FlagKind, Interval, LimitKind, PlanId, UNLIMITED};

use crate::coerce::report_malformed;
use crate::gateway::ProviderSubscription;

/// Compiled-in entitlements for a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultEntitlements {
    /// Maximum per limit kind; every kind is present
    pub limits: BTreeMap<LimitKind, u64>,
    pub docs_processing_tier: String,
    /// Every flag kind is present
    pub flags: BTreeMap<FlagKind, bool>,
}

impl DefaultEntitlements {
    /// Build from maxima in [`LimitKind::ALL`] order and flags in
    /// [`FlagKind::ALL`] order
    pub fn new(maxima: [u64; 5], docs_processing_tier: &str, flags: [bool; 3]) -> Self {
        Self {
            limits: LimitKind::ALL.into_iter().zip(maxima).collect(),
            docs_processing_tier: docs_processing_tier.to_string(),
            flags: FlagKind::ALL.into_iter().zip(flags).collect(),
        }
    }

    pub fn max(&self, kind: LimitKind) -> u64 {
        self.limits.get(&kind).copied().unwrap_or(0)
    }

    pub fn flag(&self, kind: FlagKind) -> bool {
        self.flags.get(&kind).copied().unwrap_or(false)
    }
}

/// Provider price ids for a plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceIds {
    pub monthly: Option<String>,
    pub yearly: Option<String>,
}

impl PriceIds {
    fn new(monthly: &str, yearly: &str) -> Self {
        Self {
            monthly: Some(monthly.to_string()),
            yearly: Some(yearly.to_string()),
        }
    }

    pub fn for_interval(&self, interval: Interval) -> Option<&str> {
        match interval {
            Interval::Month => self.monthly.as_deref(),
            Interval::Year => self.yearly.as_deref(),
        }
    }

    fn set(&mut self, interval: Interval, price_id: String) {
        match interval {
            Interval::Month => self.monthly = Some(price_id),
            Interval::Year => self.yearly = Some(price_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub plan: PlanId,
    pub product_id: String,
    pub prices: PriceIds,
    pub defaults: DefaultEntitlements,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    sandbox: CatalogEntry,
    professional: CatalogEntry,
    team: CatalogEntry,
    enterprise: CatalogEntry,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PlanCatalog {
    /// The plan table shipped with the console
    pub fn builtin() -> Self {
        Self {
            sandbox: CatalogEntry {
                plan: PlanId::Sandbox,
                product_id: "prod_QsZbt0DwShON3a".to_string(),
                prices: PriceIds::default(),
                defaults: DefaultEntitlements::new(
                    [1, 10, 5, 10, 50],
                    "standard",
                    [false, false, false],
                ),
            },
            professional: CatalogEntry {
                plan: PlanId::Professional,
                product_id: "prod_QsZbK1TJoho55K".to_string(),
                prices: PriceIds::new(
                    "price_1Q0oSkP1Q7ODTY3xljhmKOea",
                    "price_1Q8RKbP1Q7ODTY3xlNaUPy0U",
                ),
                defaults: DefaultEntitlements::new(
                    [3, 50, 200, 2000, 500],
                    "priority",
                    [false, false, false],
                ),
            },
            team: CatalogEntry {
                plan: PlanId::Team,
                product_id: "prod_QsZcYAP5OuWzrr".to_string(),
                prices: PriceIds::new(
                    "price_1Q7P6IP1Q7ODTY3xCfKyZyi7",
                    "price_1Q7P3sP1Q7ODTY3x54GP00jb",
                ),
                defaults: DefaultEntitlements::new(
                    [UNLIMITED, UNLIMITED, 1000, 5000, 1000],
                    "top-priority",
                    [true, true, false],
                ),
            },
            enterprise: CatalogEntry {
                plan: PlanId::Enterprise,
                product_id: "prod_QsrSCBv9JZiE6D".to_string(),
                prices: PriceIds::new(
                    "price_1Q8RN0P1Q7ODTY3xwhn1XfXT",
                    "price_1Q8RN0P1Q7ODTY3xwhn1XfXT",
                ),
                defaults: DefaultEntitlements::new(
                    [UNLIMITED; 5],
                    "top-priority",
                    [true, true, true],
                ),
            },
        }
    }

    /// Built-in table with environment overrides applied.
    ///
    /// - `STRIPE_PRODUCT_<PLAN>` replaces a product id
    /// - `STRIPE_PRICE_<PLAN>_MONTHLY` / `_YEARLY` replace price ids
    /// - `CAN_REPLACE_LOGO`, `MODEL_LB_ENABLED`, `DATASET_OPERATOR_ENABLED`
    ///   set the sandbox flags used by self-hosted deployments
    pub fn from_env() -> Self {
        let mut catalog = Self::builtin();

        for plan in PlanId::ALL {
            let upper = plan.as_str().to_ascii_uppercase();
            if let Some(product_id) = env_string(&format!("STRIPE_PRODUCT_{}", upper)) {
                catalog = catalog.with_product_id(plan, product_id);
            }
            for (interval, suffix) in [(Interval::Month, "MONTHLY"), (Interval::Year, "YEARLY")] {
                if let Some(price_id) = env_string(&format!("STRIPE_PRICE_{}_{}", upper, suffix)) {
                    catalog = catalog.with_price_id(plan, interval, price_id);
                }
            }
        }

        for (flag, var) in [
            (FlagKind::CanReplaceLogo, "CAN_REPLACE_LOGO"),
            (FlagKind::ModelLoadBalancingEnabled, "MODEL_LB_ENABLED"),
            (FlagKind::DatasetOperatorEnabled, "DATASET_OPERATOR_ENABLED"),
        ] {
            let current = catalog.sandbox.defaults.flag(flag);
            let value = env_flag(var, current);
            catalog = catalog.with_default_flag(PlanId::Sandbox, flag, value);
        }

        catalog
    }

    pub fn with_product_id(mut self, plan: PlanId, product_id: impl Into<String>) -> Self {
        self.entry_mut(plan).product_id = product_id.into();
        self
    }

    pub fn with_price_id(
        mut self,
        plan: PlanId,
        interval: Interval,
        price_id: impl Into<String>,
    ) -> Self {
        self.entry_mut(plan).prices.set(interval, price_id.into());
        self
    }

    pub fn with_default_flag(mut self, plan: PlanId, flag: FlagKind, value: bool) -> Self {
        self.entry_mut(plan).defaults.flags.insert(flag, value);
        self
    }

    pub fn with_default_limit(mut self, plan: PlanId, kind: LimitKind, max: u64) -> Self {
        self.entry_mut(plan).defaults.limits.insert(kind, max);
        self
    }

    pub fn entry(&self, plan: PlanId) -> &CatalogEntry {
        match plan {
            PlanId::Sandbox => &self.sandbox,
            PlanId::Professional => &self.professional,
            PlanId::Team => &self.team,
            PlanId::Enterprise => &self.enterprise,
        }
    }

    fn entry_mut(&mut self, plan: PlanId) -> &mut CatalogEntry {
        match plan {
            PlanId::Sandbox => &mut self.sandbox,
            PlanId::Professional => &mut self.professional,
            PlanId::Team => &mut self.team,
            PlanId::Enterprise => &mut self.enterprise,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        PlanId::ALL.into_iter().map(move |plan| self.entry(plan))
    }

    pub fn defaults(&self, plan: PlanId) -> &DefaultEntitlements {
        &self.entry(plan).defaults
    }

    pub fn product_id(&self, plan: PlanId) -> &str {
        &self.entry(plan).product_id
    }

    pub fn price_id(&self, plan: PlanId, interval: Interval) -> Option<&str> {
        self.entry(plan).prices.for_interval(interval)
    }

    /// Plan a subscription is on.
    ///
    /// A recognized plan name wins. Otherwise the price id and then the
    /// product id are looked up in the catalog; with neither matching the
    /// plan is sandbox. An unrecognized name is reported as malformed.
    pub fn plan_for_subscription(&self, subscription: &ProviderSubscription) -> PlanId {
        let name = subscription
            .plan_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        if let Some(name) = name {
            if let Ok(plan) = name.parse() {
                return plan;
            }
        }

        let plan = subscription
            .price_id
            .as_deref()
            .and_then(|price_id| self.plan_for_price(price_id))
            .or_else(|| {
                subscription
                    .product_id
                    .as_deref()
                    .and_then(|product_id| self.plan_for_product(product_id))
            })
            .unwrap_or_default();

        if let Some(name) = name {
            report_malformed("plan", &Value::String(name.to_string()), plan.as_str());
        }
        plan
    }

    /// Reverse lookup used when a subscription carries no usable plan name
    pub fn plan_for_price(&self, price_id: &str) -> Option<PlanId> {
        self.entries()
            .find(|entry| {
                entry.prices.monthly.as_deref() == Some(price_id)
                    || entry.prices.yearly.as_deref() == Some(price_id)
            })
            .map(|entry| entry.plan)
    }

    pub fn plan_for_product(&self, product_id: &str) -> Option<PlanId> {
        self.entries()
            .find(|entry| entry.product_id == product_id)
            .map(|entry| entry.plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_every_plan_has_complete_defaults() {
        let catalog = PlanCatalog::builtin();
        for entry in catalog.entries() {
            assert_eq!(entry.defaults.limits.len(), LimitKind::ALL.len());
            assert_eq!(entry.defaults.flags.len(), FlagKind::ALL.len());
            assert!(planwise_shared::is_known_docs_tier(
                &entry.defaults.docs_processing_tier
            ));
        }
    }

    #[test]
    fn test_sandbox_defaults() {
        let catalog = PlanCatalog::builtin();
        let defaults = catalog.defaults(PlanId::Sandbox);
        assert_eq!(defaults.max(LimitKind::Members), 1);
        assert_eq!(defaults.max(LimitKind::Apps), 10);
        assert_eq!(defaults.max(LimitKind::VectorSpace), 5);
        assert_eq!(defaults.max(LimitKind::AnnotationQuota), 10);
        assert_eq!(defaults.max(LimitKind::DocumentsUploadQuota), 50);
        assert!(!defaults.flag(FlagKind::CanReplaceLogo));
        assert!(catalog.price_id(PlanId::Sandbox, Interval::Month).is_none());
    }

    #[test]
    fn test_reverse_lookups() {
        let catalog = PlanCatalog::builtin();
        let price = catalog.price_id(PlanId::Team, Interval::Year).unwrap().to_string();
        assert_eq!(catalog.plan_for_price(&price), Some(PlanId::Team));
        assert_eq!(
            catalog.plan_for_product("prod_QsZbK1TJoho55K"),
            Some(PlanId::Professional)
        );
        assert_eq!(catalog.plan_for_price("price_unknown"), None);
    }

    fn subscription(
        plan_name: Option<&str>,
        price_id: Option<&str>,
        product_id: Option<&str>,
    ) -> ProviderSubscription {
        ProviderSubscription {
            id: "sub_1".to_string(),
            status: "active".to_string(),
            tenant_id: "t1".to_string(),
            plan_name: plan_name.map(str::to_string),
            interval: None,
            price_id: price_id.map(str::to_string),
            product_id: product_id.map(str::to_string),
            customer_id: None,
            current_period_end: None,
        }
    }

    #[test]
    fn test_plan_for_subscription_order() {
        let catalog = PlanCatalog::builtin();
        let team_price = catalog.price_id(PlanId::Team, Interval::Month);
        let pro_product = Some(catalog.product_id(PlanId::Professional));

        // Recognized name beats the catalog
        assert_eq!(
            catalog.plan_for_subscription(&subscription(Some(" Professional "), team_price, None)),
            PlanId::Professional
        );
        // Unrecognized name falls through to price, then product
        assert_eq!(
            catalog.plan_for_subscription(&subscription(Some("Team Monthly"), team_price, None)),
            PlanId::Team
        );
        assert_eq!(
            catalog.plan_for_subscription(&subscription(Some("Pro"), None, pro_product)),
            PlanId::Professional
        );
        assert_eq!(
            catalog.plan_for_subscription(&subscription(
                None,
                Some("price_unknown"),
                pro_product
            )),
            PlanId::Professional
        );
        // Nothing matches
        assert_eq!(
            catalog.plan_for_subscription(&subscription(Some("platinum"), None, None)),
            PlanId::Sandbox
        );
        assert_eq!(
            catalog.plan_for_subscription(&subscription(Some("  "), None, None)),
            PlanId::Sandbox
        );
    }

    #[test]
    fn test_builder_overrides() {
        let catalog = PlanCatalog::builtin()
            .with_product_id(PlanId::Team, "prod_custom")
            .with_price_id(PlanId::Team, Interval::Month, "price_custom")
            .with_default_limit(PlanId::Team, LimitKind::VectorSpace, 2000);

        assert_eq!(catalog.product_id(PlanId::Team), "prod_custom");
        assert_eq!(
            catalog.price_id(PlanId::Team, Interval::Month),
            Some("price_custom")
        );
        assert_eq!(
            catalog.defaults(PlanId::Team).max(LimitKind::VectorSpace),
            2000
        );
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("STRIPE_PRODUCT_PROFESSIONAL", "prod_env");
        std::env::set_var("STRIPE_PRICE_TEAM_YEARLY", "price_env_team_year");
        std::env::set_var("CAN_REPLACE_LOGO", "true");

        let catalog = PlanCatalog::from_env();
        assert_eq!(catalog.product_id(PlanId::Professional), "prod_env");
        assert_eq!(
            catalog.price_id(PlanId::Team, Interval::Year),
            Some("price_env_team_year")
        );
        assert!(catalog
            .defaults(PlanId::Sandbox)
            .flag(FlagKind::CanReplaceLogo));

        std::env::remove_var("STRIPE_PRODUCT_PROFESSIONAL");
        std::env::remove_var("STRIPE_PRICE_TEAM_YEARLY");
        std::env::remove_var("CAN_REPLACE_LOGO");
    }
}
