//! Pricing policy configuration for platform monetization.
//!
//! One policy row exists per principal role: buyers purchase a flat-priced
//! 24-hour access pass, resellers subscribe to one of the configured plans.
//! Policies are written by the admin surface and read-only to the
//! entitlement engine.

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Duration, Months, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::principal::PrincipalRole;
use crate::error::{MarketError, Result};

/// Unique identifier for a subscription plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(String);

impl PlanId {
    /// Creates a new plan ID after validation.
    ///
    /// # Errors
    ///
    /// Returns error if the ID is empty, exceeds 64 characters, or contains
    /// characters outside alphanumerics, hyphens, and underscores.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(MarketError::InvalidId("plan id cannot be empty".into()));
        }
        if id.len() > 64 {
            return Err(MarketError::InvalidId("plan id must be 64 characters or less".into()));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(MarketError::InvalidId(
                "plan id can only contain alphanumeric characters, hyphens, and underscores"
                    .into(),
            ));
        }
        Ok(Self(id))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unit for a plan's billing term length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    /// Calendar days.
    Days,
    /// Calendar weeks.
    Weeks,
    /// Calendar months.
    Months,
}

/// A reseller subscription plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan identifier.
    pub id: PlanId,
    /// Display name.
    pub name: String,
    /// Length of one billing term, in `duration_unit` units.
    pub duration_value: u32,
    /// Unit for `duration_value`.
    pub duration_unit: DurationUnit,
    /// Price per term.
    pub price: Decimal,
    /// Optional discount off the term price.
    pub discount: Option<Decimal>,
    /// Trial days granted when subscribing to this plan.
    pub trial_days: u32,
    /// Whether the subscription renews automatically at term end.
    pub auto_renew: bool,
    /// Whether the plan is open to new subscriptions.
    pub is_active: bool,
}

impl Plan {
    /// End instant of one billing term starting at `start`.
    ///
    /// Months follow the calendar; a term started on the 31st lands on the
    /// closest valid day of the target month.
    #[must_use]
    pub fn term_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        match self.duration_unit {
            DurationUnit::Days => start + Duration::days(i64::from(self.duration_value)),
            DurationUnit::Weeks => start + Duration::weeks(i64::from(self.duration_value)),
            DurationUnit::Months => start
                .checked_add_months(Months::new(self.duration_value))
                .unwrap_or_else(|| start + Duration::days(i64::from(self.duration_value) * 30)),
        }
    }

    /// Effective term price after discount, floored at zero.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        match self.discount {
            Some(discount) => (self.price - discount).max(Decimal::ZERO),
            None => self.price,
        }
    }
}

/// Role-specific monetization terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyTerms {
    /// Buyers purchase a flat-priced, fixed-length access pass.
    Buyer {
        /// Price of one access pass.
        access_price_unit: Decimal,
        /// Length of one access pass in hours.
        access_duration_hours: u32,
    },
    /// Resellers subscribe to one of the configured plans.
    Reseller {
        /// Free trial length granted once per principal lifetime.
        free_trial_days: u32,
        /// Available subscription plans, in display order.
        plans: Vec<Plan>,
    },
}

/// Admin-configured monetization rules for one principal role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Role this policy applies to.
    pub role: PrincipalRole,
    /// Kill-switch: when false, every principal of the role is entitled
    /// unconditionally.
    pub is_active: bool,
    /// Length of the courtesy window opened when a subscription lapses.
    pub grace_period_days: u32,
    /// Role-specific terms.
    pub terms: PolicyTerms,
}

impl PricingPolicy {
    /// Trial length for the role; zero when the role has no trial offer.
    #[must_use]
    pub fn trial_days(&self) -> u32 {
        match &self.terms {
            PolicyTerms::Reseller { free_trial_days, .. } => *free_trial_days,
            PolicyTerms::Buyer { .. } => 0,
        }
    }

    /// Plans configured for the role; empty for buyers.
    #[must_use]
    pub fn plans(&self) -> &[Plan] {
        match &self.terms {
            PolicyTerms::Reseller { plans, .. } => plans,
            PolicyTerms::Buyer { .. } => &[],
        }
    }

    /// Looks up a plan open to new subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PlanNotFound`] when the plan is absent or
    /// retired.
    pub fn active_plan(&self, id: &PlanId) -> Result<&Plan> {
        self.plans()
            .iter()
            .find(|plan| plan.id == *id && plan.is_active)
            .ok_or_else(|| MarketError::PlanNotFound(id.to_string()))
    }
}

/// Read access to pricing policies.
///
/// The entitlement engine only ever reads policies; writes happen through
/// the admin surface.
pub trait PolicyStore: Send + Sync {
    /// Returns the policy configured for `role`, if any.
    fn policy_for(&self, role: PrincipalRole) -> Option<PricingPolicy>;
}

/// In-memory policy store.
///
/// Plans referenced by running subscriptions are never removed; the admin
/// surface retires them instead, which leaves the row in place for
/// subscriptions still dereferencing it.
#[derive(Debug, Default)]
pub struct InMemoryPolicyStore {
    policies: RwLock<HashMap<PrincipalRole, PricingPolicy>>,
}

impl InMemoryPolicyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the policy for its role.
    pub fn upsert(&self, policy: PricingPolicy) {
        self.policies.write().insert(policy.role, policy);
    }

    /// Retires a plan so it accepts no new subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PolicyNotFound`] when the role has no policy
    /// and [`MarketError::PlanNotFound`] when the plan does not exist.
    pub fn retire_plan(&self, role: PrincipalRole, plan_id: &PlanId) -> Result<()> {
        let mut policies = self.policies.write();
        let policy = policies.get_mut(&role).ok_or(MarketError::PolicyNotFound(role))?;
        let PolicyTerms::Reseller { plans, .. } = &mut policy.terms else {
            return Err(MarketError::PlanNotFound(plan_id.to_string()));
        };
        let plan = plans
            .iter_mut()
            .find(|plan| plan.id == *plan_id)
            .ok_or_else(|| MarketError::PlanNotFound(plan_id.to_string()))?;
        plan.is_active = false;
        Ok(())
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn policy_for(&self, role: PrincipalRole) -> Option<PricingPolicy> {
        self.policies.read().get(&role).cloned()
    }
}
