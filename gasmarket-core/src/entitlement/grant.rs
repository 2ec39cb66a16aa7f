//! Entitlement mutations applied on payment confirmation and trial start.
//!
//! The only three operations allowed to open a paid or trial window live
//! here. Purchases require a [`PaymentConfirmation`] value from the payment
//! gateway, making "a confirmed payment is the sole trigger" a property of
//! the call signature rather than a convention.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{
    policy::{PlanId, PolicyStore, PolicyTerms},
    principal::{PrincipalId, PrincipalRecord, PrincipalStore},
};
use crate::{
    error::{MarketError, Result},
    notify::{NotificationDispatcher, NotificationEvent},
};

/// Proof of a successful payment-gateway confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Gateway transaction reference.
    pub reference: String,
    /// Amount captured.
    pub amount: Decimal,
    /// Instant the gateway confirmed the capture.
    pub confirmed_at: DateTime<Utc>,
}

/// Applies the legal mutations of a principal's entitlement windows.
#[derive(Clone)]
pub struct EntitlementGrants {
    principals: Arc<dyn PrincipalStore>,
    policies: Arc<dyn PolicyStore>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl fmt::Debug for EntitlementGrants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitlementGrants").finish_non_exhaustive()
    }
}

impl EntitlementGrants {
    /// Creates a grant service over the given collaborators.
    #[must_use]
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        policies: Arc<dyn PolicyStore>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self { principals, policies, notifier }
    }

    /// Applies a confirmed reseller plan purchase.
    ///
    /// The new term extends from the current subscription end when one is
    /// still open, otherwise from the confirmation instant. Any grace
    /// window closes: the principal is paid up again.
    ///
    /// # Errors
    ///
    /// Returns `PrincipalNotFound` or `PolicyNotFound` when collaborator
    /// rows are missing, and `PlanNotFound` when the plan is absent or
    /// retired.
    #[instrument(skip(self, confirmation), fields(principal = %principal_id, plan = %plan_id))]
    pub fn apply_subscription_purchase(
        &self,
        principal_id: &PrincipalId,
        plan_id: &PlanId,
        confirmation: &PaymentConfirmation,
    ) -> Result<PrincipalRecord> {
        let mut record = self.principals.get(principal_id)?;
        let policy = self
            .policies
            .policy_for(record.role)
            .ok_or(MarketError::PolicyNotFound(record.role))?;
        let plan = policy.active_plan(plan_id)?;

        let start = match record.entitlement.subscription_end_date {
            Some(end) if end > confirmation.confirmed_at => end,
            _ => confirmation.confirmed_at,
        };
        let new_end = plan.term_end(start);

        record.entitlement.subscription_end_date = Some(new_end);
        record.entitlement.subscription_auto_renew = plan.auto_renew;
        record.entitlement.grace_period_end_date = None;
        self.principals.put(record.clone())?;

        info!(reference = %confirmation.reference, %new_end, "subscription purchase applied");
        self.notifier.dispatch(NotificationEvent::SubscriptionActivated {
            principal_id: record.id.clone(),
            ends_at: new_end,
        });
        Ok(record)
    }

    /// Applies a confirmed buyer access-pass purchase.
    ///
    /// Opens a window of the policy's configured pass length starting at
    /// the confirmation instant.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when the principal's role does not buy access
    /// passes.
    #[instrument(skip(self, confirmation), fields(principal = %principal_id))]
    pub fn apply_access_pass_purchase(
        &self,
        principal_id: &PrincipalId,
        confirmation: &PaymentConfirmation,
    ) -> Result<PrincipalRecord> {
        let mut record = self.principals.get(principal_id)?;
        let policy = self
            .policies
            .policy_for(record.role)
            .ok_or(MarketError::PolicyNotFound(record.role))?;
        let PolicyTerms::Buyer { access_duration_hours, .. } = policy.terms else {
            return Err(MarketError::Forbidden(format!(
                "access passes are sold to buyers only, {principal_id} is a {}",
                record.role
            )));
        };

        let new_end = confirmation.confirmed_at + Duration::hours(i64::from(access_duration_hours));
        record.entitlement.subscription_end_date = Some(new_end);
        record.entitlement.subscription_auto_renew = false;
        record.entitlement.grace_period_end_date = None;
        self.principals.put(record.clone())?;

        info!(reference = %confirmation.reference, %new_end, "access pass purchase applied");
        self.notifier.dispatch(NotificationEvent::SubscriptionActivated {
            principal_id: record.id.clone(),
            ends_at: new_end,
        });
        Ok(record)
    }

    /// Starts the principal's one-time free trial.
    ///
    /// # Errors
    ///
    /// Returns `TrialAlreadyUsed` when the lifetime trial was consumed and
    /// `Forbidden` when the role has no trial offer.
    #[instrument(skip(self), fields(principal = %principal_id))]
    pub fn start_free_trial(
        &self,
        principal_id: &PrincipalId,
        now: DateTime<Utc>,
    ) -> Result<PrincipalRecord> {
        let mut record = self.principals.get(principal_id)?;
        if record.entitlement.free_trial_used {
            return Err(MarketError::TrialAlreadyUsed(principal_id.to_string()));
        }
        let policy = self
            .policies
            .policy_for(record.role)
            .ok_or(MarketError::PolicyNotFound(record.role))?;
        let trial_days = policy.trial_days();
        if trial_days == 0 {
            return Err(MarketError::Forbidden(format!(
                "role {} has no trial offer",
                record.role
            )));
        }

        let ends_at = now + Duration::days(i64::from(trial_days));
        record.entitlement.free_trial_end_date = Some(ends_at);
        record.entitlement.free_trial_used = true;
        self.principals.put(record.clone())?;

        info!(%ends_at, "free trial started");
        self.notifier.dispatch(NotificationEvent::TrialStarted {
            principal_id: record.id.clone(),
            ends_at,
        });
        Ok(record)
    }
}
