//! Principal identity and entitlement state.
//!
//! A principal is a buyer or reseller account subject to entitlement rules.
//! The temporal fields here live on the platform's user entity; this module
//! defines their shape and the persistence seam through which the resolver,
//! the grants, and the expiry sweep read and write them.

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{MarketError, Result};

/// Unique identifier for a principal.
///
/// Wraps the platform's account identifier with type safety.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Creates a new principal ID after validation.
    ///
    /// # Errors
    ///
    /// Returns error if the ID is empty, exceeds 64 characters, or contains
    /// characters outside alphanumerics, hyphens, and underscores.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(MarketError::InvalidId("principal id cannot be empty".into()));
        }
        if id.len() > 64 {
            return Err(MarketError::InvalidId("principal id must be 64 characters or less".into()));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(MarketError::InvalidId(
                "principal id can only contain alphanumeric characters, hyphens, and underscores"
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

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role a principal holds on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalRole {
    /// Orders gas bottles from resellers.
    Buyer,
    /// Lists a catalog and fulfills orders.
    Reseller,
}

impl PrincipalRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Reseller => "reseller",
        }
    }
}

impl fmt::Display for PrincipalRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temporal entitlement fields living on the principal's account entity.
///
/// At most one of the subscription, trial, and grace windows is the one
/// used to grant access at a given instant; the resolver picks it by fixed
/// precedence rather than treating the windows as additive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalEntitlementState {
    /// End of the paid subscription or access-pass window, if one was opened.
    pub subscription_end_date: Option<DateTime<Utc>>,
    /// Whether the subscription renews automatically at term end.
    pub subscription_auto_renew: bool,
    /// End of the free trial window, if one was started.
    pub free_trial_end_date: Option<DateTime<Utc>>,
    /// One-shot flag, latched true the moment a trial starts. Never reset.
    pub free_trial_used: bool,
    /// End of the courtesy window opened when the subscription lapsed.
    pub grace_period_end_date: Option<DateTime<Utc>>,
}

/// A principal together with its entitlement state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    /// Account identifier.
    pub id: PrincipalId,
    /// Role the principal holds.
    pub role: PrincipalRole,
    /// Temporal entitlement fields.
    pub entitlement: PrincipalEntitlementState,
}

/// Persistence collaborator for principal entitlement state.
pub trait PrincipalStore: Send + Sync {
    /// Loads a principal by id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::PrincipalNotFound`] if no such principal exists.
    fn get(&self, id: &PrincipalId) -> Result<PrincipalRecord>;

    /// Inserts or replaces a principal record.
    ///
    /// Implementations must keep `free_trial_used` latched: once stored as
    /// true it stays true regardless of what later writes carry.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store rejects the write.
    fn put(&self, record: PrincipalRecord) -> Result<()>;

    /// Principals whose subscription or grace window has already passed.
    ///
    /// The expiry sweep iterates this set; principals with no lapsed window
    /// are not returned.
    fn expiry_candidates(&self, now: DateTime<Utc>) -> Vec<PrincipalRecord>;
}

/// In-memory principal store.
#[derive(Debug, Default)]
pub struct InMemoryPrincipalStore {
    records: RwLock<HashMap<PrincipalId, PrincipalRecord>>,
}

impl InMemoryPrincipalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrincipalStore for InMemoryPrincipalStore {
    fn get(&self, id: &PrincipalId) -> Result<PrincipalRecord> {
        self.records
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| MarketError::PrincipalNotFound(id.to_string()))
    }

    fn put(&self, mut record: PrincipalRecord) -> Result<()> {
        let mut records = self.records.write();
        if let Some(existing) = records.get(&record.id)
            && existing.entitlement.free_trial_used
        {
            // Lifetime one-shot: the flag never unlatches.
            record.entitlement.free_trial_used = true;
        }
        records.insert(record.id.clone(), record);
        Ok(())
    }

    fn expiry_candidates(&self, now: DateTime<Utc>) -> Vec<PrincipalRecord> {
        self.records
            .read()
            .values()
            .filter(|record| {
                let ent = &record.entitlement;
                ent.subscription_end_date.is_some_and(|end| end <= now)
                    || ent.grace_period_end_date.is_some_and(|end| end <= now)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(id: &str) -> PrincipalRecord {
        PrincipalRecord {
            id: PrincipalId::new(id).unwrap(),
            role: PrincipalRole::Reseller,
            entitlement: PrincipalEntitlementState::default(),
        }
    }

    // ========================================================================
    // PrincipalId Tests
    // ========================================================================

    #[test]
    fn test_principal_id_valid() {
        let id = PrincipalId::new("user-123").unwrap();
        assert_eq!(id.as_str(), "user-123");
    }

    #[test]
    fn test_principal_id_empty_rejected() {
        let result = PrincipalId::new("");
        assert!(matches!(result.unwrap_err(), MarketError::InvalidId(_)));
    }

    #[test]
    fn test_principal_id_too_long_rejected() {
        let result = PrincipalId::new("a".repeat(65));
        assert!(matches!(result.unwrap_err(), MarketError::InvalidId(_)));
    }

    #[test]
    fn test_principal_id_rejects_special_chars() {
        assert!(PrincipalId::new("user@example").is_err());
        assert!(PrincipalId::new("user 1").is_err());
    }

    // ========================================================================
    // Role Tests
    // ========================================================================

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&PrincipalRole::Buyer).unwrap(), "\"buyer\"");
        assert_eq!(serde_json::to_string(&PrincipalRole::Reseller).unwrap(), "\"reseller\"");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(PrincipalRole::Buyer.to_string(), "buyer");
    }

    // ========================================================================
    // Store Tests
    // ========================================================================

    #[test]
    fn test_get_missing_principal() {
        let store = InMemoryPrincipalStore::new();
        let result = store.get(&PrincipalId::new("ghost").unwrap());
        assert!(matches!(result.unwrap_err(), MarketError::PrincipalNotFound(_)));
    }

    #[test]
    fn test_put_and_get_roundtrip() {
        let store = InMemoryPrincipalStore::new();
        let rec = record("r1");
        store.put(rec.clone()).unwrap();
        assert_eq!(store.get(&rec.id).unwrap(), rec);
    }

    #[test]
    fn test_free_trial_used_latches() {
        let store = InMemoryPrincipalStore::new();
        let mut rec = record("r1");
        rec.entitlement.free_trial_used = true;
        store.put(rec.clone()).unwrap();

        // A later write claiming the trial was never used must not unlatch it.
        rec.entitlement.free_trial_used = false;
        store.put(rec.clone()).unwrap();

        assert!(store.get(&rec.id).unwrap().entitlement.free_trial_used);
    }

    #[test]
    fn test_expiry_candidates_filters_lapsed_windows() {
        let store = InMemoryPrincipalStore::new();
        let now = Utc::now();

        let mut lapsed = record("lapsed");
        lapsed.entitlement.subscription_end_date = Some(now - Duration::days(1));
        store.put(lapsed).unwrap();

        let mut active = record("active");
        active.entitlement.subscription_end_date = Some(now + Duration::days(1));
        store.put(active).unwrap();

        let mut grace_lapsed = record("grace-lapsed");
        grace_lapsed.entitlement.grace_period_end_date = Some(now - Duration::hours(1));
        store.put(grace_lapsed).unwrap();

        store.put(record("untouched")).unwrap();

        let candidates = store.expiry_candidates(now);
        let mut ids: Vec<_> = candidates.iter().map(|r| r.id.as_str().to_owned()).collect();
        ids.sort();
        assert_eq!(ids, vec!["grace-lapsed", "lapsed"]);
    }
}
