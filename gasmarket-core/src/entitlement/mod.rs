//! Access/entitlement engine.
//!
//! This module decides, for any principal and at any instant, whether that
//! principal may use the paid features of the platform. It covers the
//! admin-configured pricing policies, the pure entitlement resolver, the
//! payment-confirmation grants that open paid windows, and the recurring
//! sweep that lapses them again.

pub mod grant;
pub mod policy;
pub mod principal;
pub mod resolver;
pub mod scheduler;


pub use grant::{EntitlementGrants, PaymentConfirmation};
pub use policy::{
    DurationUnit, InMemoryPolicyStore, Plan, PlanId, PolicyStore, PolicyTerms, PricingPolicy,
};
pub use principal::{
    InMemoryPrincipalStore, PrincipalEntitlementState, PrincipalId, PrincipalRecord,
    PrincipalRole, PrincipalStore,
};
pub use resolver::{EntitlementService, EntitlementStatus, resolve};
pub use scheduler::{SchedulerConfig, SchedulerHandle, SubscriptionExpiryScheduler, SweepReport};
