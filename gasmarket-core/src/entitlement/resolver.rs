//! Entitlement classification for access-gated requests.
//!
//! Classification is a pure read over the principal's temporal state and
//! the role's pricing policy. It takes the current instant as an argument
//! and is never cached: the expiry sweep mutates the same records between
//! calls, so every gate evaluates against fresh wall-clock time.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{
    policy::{PolicyStore, PricingPolicy},
    principal::{PrincipalEntitlementState, PrincipalRole},
};
use crate::error::{MarketError, Result};

const SECS_PER_DAY: i64 = 86_400;

/// Computed access classification for a principal at one instant.
///
/// Variants are listed in precedence order; [`resolve`] returns the first
/// one whose guard matches, even when later windows are also open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntitlementStatus {
    /// Monetization is disabled for the role; access is unconditional.
    FreeUnlimited,
    /// A paid subscription or access-pass window is open.
    ActiveSubscription {
        /// Whole days until the window closes, rounded up.
        days_remaining: i64,
        /// Whether the subscription renews automatically.
        auto_renew: bool,
    },
    /// The one-shot free trial window is open.
    FreeTrial {
        /// Whole days until the window closes, rounded up.
        days_remaining: i64,
        /// Trial length the policy grants, for display alongside the countdown.
        total_trial_days: u32,
    },
    /// The subscription lapsed but a courtesy window remains.
    GracePeriod {
        /// Whole days until the window closes, rounded up.
        days_remaining: i64,
    },
    /// No open window. The client may offer a trial or only paid plans.
    NoAccess {
        /// Whether the principal already consumed its lifetime trial.
        free_trial_used: bool,
    },
}

impl EntitlementStatus {
    /// True when the classification grants access to paid features.
    #[must_use]
    pub fn grants_access(&self) -> bool {
        !matches!(self, Self::NoAccess { .. })
    }
}

/// Whole days until `end`, rounded up.
///
/// Only called with `end > now`. A window closing in 30 minutes reports one
/// day remaining, never zero; the `max(1)` also covers sub-second windows
/// that truncate to zero seconds.
fn days_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (end - now).num_seconds();
    ((secs + SECS_PER_DAY - 1) / SECS_PER_DAY).max(1)
}

/// Classifies a principal's access at `now`.
///
/// The guard chain is evaluated strictly in precedence order: the admin
/// kill-switch first, then subscription, trial, and grace windows, and
/// finally no access. The ordering is the invariant; the windows are not
/// additive.
#[must_use]
pub fn resolve(
    state: &PrincipalEntitlementState,
    policy: &PricingPolicy,
    now: DateTime<Utc>,
) -> EntitlementStatus {
    if !policy.is_active {
        return EntitlementStatus::FreeUnlimited;
    }
    if let Some(end) = state.subscription_end_date
        && end > now
    {
        return EntitlementStatus::ActiveSubscription {
            days_remaining: days_remaining(end, now),
            auto_renew: state.subscription_auto_renew,
        };
    }
    if let Some(end) = state.free_trial_end_date
        && end > now
    {
        return EntitlementStatus::FreeTrial {
            days_remaining: days_remaining(end, now),
            total_trial_days: policy.trial_days(),
        };
    }
    if let Some(end) = state.grace_period_end_date
        && end > now
    {
        return EntitlementStatus::GracePeriod { days_remaining: days_remaining(end, now) };
    }
    EntitlementStatus::NoAccess { free_trial_used: state.free_trial_used }
}

/// Store-backed facade over [`resolve`].
#[derive(Clone)]
pub struct EntitlementService {
    policies: Arc<dyn PolicyStore>,
}

impl fmt::Debug for EntitlementService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitlementService").finish_non_exhaustive()
    }
}

impl EntitlementService {
    /// Creates a service reading policies from `policies`.
    #[must_use]
    pub fn new(policies: Arc<dyn PolicyStore>) -> Self {
        Self { policies }
    }

    /// Classifies `state` under the policy configured for `role`.
    ///
    /// A missing policy row resolves to
    /// [`EntitlementStatus::FreeUnlimited`]: a misconfigured deployment
    /// must not lock out all traffic. The gap is logged so operators can
    /// spot it.
    #[must_use]
    pub fn resolve_for(
        &self,
        role: PrincipalRole,
        state: &PrincipalEntitlementState,
        now: DateTime<Utc>,
    ) -> EntitlementStatus {
        match self.policies.policy_for(role) {
            Some(policy) => resolve(state, &policy, now),
            None => {
                warn!(%role, "no pricing policy configured; failing open");
                EntitlementStatus::FreeUnlimited
            }
        }
    }

    /// Strict policy accessor for callers that must observe configuration
    /// gaps instead of failing open.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PolicyNotFound`] when no policy row exists
    /// for the role.
    pub fn require_policy(&self, role: PrincipalRole) -> Result<PricingPolicy> {
        self.policies.policy_for(role).ok_or(MarketError::PolicyNotFound(role))
    }
}
