//! Recurring sweep that lapses expired subscriptions.
//!
//! The sweep runs once per tick over every principal with a passed
//! subscription or grace window: a fresh lapse opens the policy-configured
//! grace window, a passed grace window finalizes expiry. A window already
//! open is never re-extended, so running the sweep twice at the same
//! instant is a no-op.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, instrument, warn};

use super::{
    policy::PolicyStore,
    principal::{PrincipalRecord, PrincipalStore},
};
use crate::{
    error::Result,
    notify::{NotificationDispatcher, NotificationEvent},
};

/// Configuration for the expiry sweep cadence.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between sweep ticks.
    ///
    /// The platform runs one sweep per calendar day in its operating
    /// region; tests shrink this to drive ticks quickly.
    pub tick_interval: std::time::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_interval: std::time::Duration::from_secs(24 * 60 * 60) }
    }
}

/// Outcome of one sweep.
///
/// Per-principal failures never abort a sweep; they surface here as the
/// `skipped` count and are retried wholesale on the next tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Principals whose lapse opened a new grace window.
    pub grace_opened: u32,
    /// Principals whose grace window lapsed and whose expiry was finalized.
    pub expired: u32,
    /// Principals skipped because their update failed.
    pub skipped: u32,
}

enum SweepOutcome {
    GraceOpened,
    Expired,
}

/// Background sweep transitioning lapsed principals into grace or expiry.
pub struct SubscriptionExpiryScheduler {
    principals: Arc<dyn PrincipalStore>,
    policies: Arc<dyn PolicyStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    config: SchedulerConfig,
    sweeping: AtomicBool,
}

impl fmt::Debug for SubscriptionExpiryScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionExpiryScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SubscriptionExpiryScheduler {
    /// Creates a scheduler over the given collaborators.
    #[must_use]
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        policies: Arc<dyn PolicyStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        Self { principals, policies, notifier, config, sweeping: AtomicBool::new(false) }
    }

    /// Runs a single sweep over all lapse candidates at `now`.
    ///
    /// Public so tests and operational tooling can drive individual ticks
    /// deterministically.
    #[instrument(skip(self), fields(%now))]
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        for record in self.principals.expiry_candidates(now) {
            let principal = record.id.clone();
            match self.sweep_principal(record, now) {
                Ok(Some(SweepOutcome::GraceOpened)) => report.grace_opened += 1,
                Ok(Some(SweepOutcome::Expired)) => report.expired += 1,
                Ok(None) => {}
                Err(error) => {
                    warn!(%principal, %error, "sweep skipped principal");
                    report.skipped += 1;
                }
            }
        }
        info!(
            grace_opened = report.grace_opened,
            expired = report.expired,
            skipped = report.skipped,
            "expiry sweep finished"
        );
        report
    }

    fn sweep_principal(
        &self,
        mut record: PrincipalRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<SweepOutcome>> {
        if let Some(grace_end) = record.entitlement.grace_period_end_date {
            if grace_end > now {
                // Window still open; never re-extend it.
                return Ok(None);
            }
            record.entitlement.subscription_end_date = None;
            record.entitlement.grace_period_end_date = None;
            let principal_id = record.id.clone();
            self.principals.put(record)?;
            self.notifier.dispatch(NotificationEvent::SubscriptionExpired { principal_id });
            return Ok(Some(SweepOutcome::Expired));
        }

        let Some(sub_end) = record.entitlement.subscription_end_date else {
            return Ok(None);
        };
        if sub_end > now {
            return Ok(None);
        }
        let Some(policy) = self.policies.policy_for(record.role) else {
            debug!(principal = %record.id, role = %record.role, "no policy for role; leaving lapsed subscription untouched");
            return Ok(None);
        };

        let ends_at = now + Duration::days(i64::from(policy.grace_period_days));
        record.entitlement.grace_period_end_date = Some(ends_at);
        let principal_id = record.id.clone();
        self.principals.put(record)?;
        self.notifier.dispatch(NotificationEvent::GracePeriodOpened { principal_id, ends_at });
        Ok(Some(SweepOutcome::GraceOpened))
    }

    /// Runs a sweep unless one is already in flight.
    ///
    /// Overlapping sweeps could re-extend a grace window the in-flight
    /// sweep just opened, so a late tick is dropped instead of queued.
    pub fn try_sweep(&self, now: DateTime<Utc>) -> Option<SweepReport> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            warn!("previous expiry sweep still running; skipping tick");
            return None;
        }
        let report = self.sweep(now);
        self.sweeping.store(false, Ordering::Release);
        Some(report)
    }

    /// Spawns the recurring sweep task.
    ///
    /// The first tick fires immediately, then once per configured interval;
    /// ticks missed while a sweep runs are skipped.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = Arc::clone(&self);
        let task = tokio::spawn(async move {
            let mut ticks = time::interval(scheduler.config.tick_interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticks.tick() => {
                        scheduler.try_sweep(Utc::now());
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("expiry scheduler stopped");
        });
        SchedulerHandle { shutdown: shutdown_tx, task }
    }
}

/// Handle controlling the running sweep task.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals shutdown and waits for the task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        entitlement::{
            policy::{InMemoryPolicyStore, PolicyTerms, PricingPolicy},
            principal::{
                InMemoryPrincipalStore, PrincipalEntitlementState, PrincipalId, PrincipalRole,
            },
        },
        error::MarketError,
    };

    #[derive(Default)]
    struct RecordingDispatcher {
        events: Mutex<Vec<NotificationEvent>>,
    }

    impl NotificationDispatcher for RecordingDispatcher {
        fn dispatch(&self, event: NotificationEvent) {
            self.events.lock().push(event);
        }
    }

    /// Store wrapper that fails every write for one principal.
    struct FailingStore {
        inner: InMemoryPrincipalStore,
        poison: PrincipalId,
    }

    impl PrincipalStore for FailingStore {
        fn get(&self, id: &PrincipalId) -> Result<PrincipalRecord> {
            self.inner.get(id)
        }

        fn put(&self, record: PrincipalRecord) -> Result<()> {
            if record.id == self.poison {
                return Err(MarketError::PrincipalNotFound(record.id.to_string()));
            }
            self.inner.put(record)
        }

        fn expiry_candidates(&self, now: DateTime<Utc>) -> Vec<PrincipalRecord> {
            self.inner.expiry_candidates(now)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 3, 0, 0).unwrap()
    }

    fn policies() -> Arc<InMemoryPolicyStore> {
        let store = InMemoryPolicyStore::new();
        store.upsert(PricingPolicy {
            role: PrincipalRole::Reseller,
            is_active: true,
            grace_period_days: 3,
            terms: PolicyTerms::Reseller { free_trial_days: 7, plans: vec![] },
        });
        store.upsert(PricingPolicy {
            role: PrincipalRole::Buyer,
            is_active: true,
            grace_period_days: 1,
            terms: PolicyTerms::Buyer {
                access_price_unit: Decimal::new(500, 0),
                access_duration_hours: 24,
            },
        });
        Arc::new(store)
    }

    fn lapsed_record(id: &str, lapsed_for: Duration) -> PrincipalRecord {
        PrincipalRecord {
            id: PrincipalId::new(id).unwrap(),
            role: PrincipalRole::Reseller,
            entitlement: PrincipalEntitlementState {
                subscription_end_date: Some(now() - lapsed_for),
                ..PrincipalEntitlementState::default()
            },
        }
    }

    fn scheduler(
        principals: Arc<dyn PrincipalStore>,
    ) -> (Arc<SubscriptionExpiryScheduler>, Arc<RecordingDispatcher>) {
        let notifier = Arc::new(RecordingDispatcher::default());
        let scheduler = Arc::new(SubscriptionExpiryScheduler::new(
            principals,
            policies(),
            notifier.clone(),
            SchedulerConfig::default(),
        ));
        (scheduler, notifier)
    }

    // ========================================================================
    // Sweep Tests
    // ========================================================================

    #[test]
    fn test_lapse_opens_grace_window_once() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        principals.put(lapsed_record("r1", Duration::days(1))).unwrap();
        let (scheduler, notifier) = scheduler(principals.clone());

        let report = scheduler.sweep(now());
        assert_eq!(report, SweepReport { grace_opened: 1, expired: 0, skipped: 0 });

        let record = principals.get(&PrincipalId::new("r1").unwrap()).unwrap();
        let grace_end = record.entitlement.grace_period_end_date.unwrap();
        assert_eq!(grace_end, now() + Duration::days(3));
        // The lapsed subscription end stays in place until true expiry.
        assert!(record.entitlement.subscription_end_date.is_some());

        // Second tick the same day: the open window is not re-extended.
        let report = scheduler.sweep(now());
        assert_eq!(report, SweepReport::default());
        let record = principals.get(&PrincipalId::new("r1").unwrap()).unwrap();
        assert_eq!(record.entitlement.grace_period_end_date, Some(grace_end));

        assert!(matches!(
            notifier.events.lock().as_slice(),
            [NotificationEvent::GracePeriodOpened { .. }]
        ));
    }

    #[test]
    fn test_grace_length_comes_from_role_policy() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let mut buyer = lapsed_record("b1", Duration::days(1));
        buyer.role = PrincipalRole::Buyer;
        principals.put(buyer).unwrap();
        let (scheduler, _) = scheduler(principals.clone());

        scheduler.sweep(now());

        let record = principals.get(&PrincipalId::new("b1").unwrap()).unwrap();
        assert_eq!(record.entitlement.grace_period_end_date, Some(now() + Duration::days(1)));
    }

    #[test]
    fn test_lapsed_grace_finalizes_expiry() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let mut record = lapsed_record("r1", Duration::days(10));
        record.entitlement.grace_period_end_date = Some(now() - Duration::days(1));
        principals.put(record).unwrap();
        let (scheduler, notifier) = scheduler(principals.clone());

        let report = scheduler.sweep(now());
        assert_eq!(report, SweepReport { grace_opened: 0, expired: 1, skipped: 0 });

        let record = principals.get(&PrincipalId::new("r1").unwrap()).unwrap();
        assert!(record.entitlement.subscription_end_date.is_none());
        assert!(record.entitlement.grace_period_end_date.is_none());
        assert!(matches!(
            notifier.events.lock().as_slice(),
            [NotificationEvent::SubscriptionExpired { .. }]
        ));
    }

    #[test]
    fn test_active_subscription_untouched() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let mut record = lapsed_record("r1", Duration::days(1));
        record.entitlement.subscription_end_date = Some(now() + Duration::days(5));
        principals.put(record.clone()).unwrap();
        let (scheduler, _) = scheduler(principals.clone());

        let report = scheduler.sweep(now());
        assert_eq!(report, SweepReport::default());
        assert_eq!(principals.get(&record.id).unwrap(), record);
    }

    #[test]
    fn test_missing_policy_leaves_principal_untouched() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        principals.put(lapsed_record("r1", Duration::days(1))).unwrap();
        let notifier = Arc::new(RecordingDispatcher::default());
        let scheduler = SubscriptionExpiryScheduler::new(
            principals.clone(),
            Arc::new(InMemoryPolicyStore::new()),
            notifier,
            SchedulerConfig::default(),
        );

        let report = scheduler.sweep(now());
        assert_eq!(report, SweepReport::default());
        let record = principals.get(&PrincipalId::new("r1").unwrap()).unwrap();
        assert!(record.entitlement.grace_period_end_date.is_none());
    }

    #[test]
    fn test_failed_update_is_skipped_not_fatal() {
        let inner = InMemoryPrincipalStore::new();
        inner.put(lapsed_record("healthy", Duration::days(1))).unwrap();
        inner.put(lapsed_record("poisoned", Duration::days(1))).unwrap();
        let principals = Arc::new(FailingStore {
            inner,
            poison: PrincipalId::new("poisoned").unwrap(),
        });
        let (scheduler, _) = scheduler(principals.clone());

        let report = scheduler.sweep(now());
        assert_eq!(report, SweepReport { grace_opened: 1, expired: 0, skipped: 1 });

        // The healthy principal was still processed.
        let record = principals.get(&PrincipalId::new("healthy").unwrap()).unwrap();
        assert!(record.entitlement.grace_period_end_date.is_some());
    }

    #[test]
    fn test_try_sweep_runs_when_idle() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        let (scheduler, _) = scheduler(principals);
        assert!(scheduler.try_sweep(now()).is_some());
    }

    // ========================================================================
    // Task Lifecycle Tests
    // ========================================================================

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_and_stop_drive_sweeps() {
        let principals = Arc::new(InMemoryPrincipalStore::new());
        principals.put(lapsed_record("r1", Duration::days(365))).unwrap();
        let notifier = Arc::new(RecordingDispatcher::default());
        let scheduler = Arc::new(SubscriptionExpiryScheduler::new(
            principals.clone(),
            policies(),
            notifier,
            SchedulerConfig { tick_interval: std::time::Duration::from_millis(10) },
        ));

        let handle = Arc::clone(&scheduler).start();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.stop().await;

        // The record lapsed a year ago, so the first real-time tick opened
        // its grace window.
        let record = principals.get(&PrincipalId::new("r1").unwrap()).unwrap();
        assert!(record.entitlement.grace_period_end_date.is_some());
    }
}
