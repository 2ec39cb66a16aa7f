//! Gasmarket Core: Entitlement Engine and Order Lifecycle
//!
//! A Rust library implementing the two stateful subsystems of the gasmarket
//! gas-bottle marketplace: the access/entitlement engine that decides, for
//! any principal at any instant, whether that principal may use the paid
//! features of the platform, and the order lifecycle state machine that
//! moves a purchase order from creation to fulfillment under two
//! authorization domains (buyer vs. reseller).
//!
//! The surrounding CRUD layer (routing, ORM persistence, sessions, payment
//! gateway, push/SMS delivery) plugs in through the trait seams in this
//! crate; in-memory reference implementations are provided for tests and
//! single-process deployments.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │   CRUD layer       │  controllers, routing, ORM (out of scope)
//! └─────────┬──────────┘
//!           │
//! ┌─────────▼───────────────────────────────────────────┐
//! │             gasmarket-core (this crate)             │
//! │  ┌───────────────┐        ┌──────────────────────┐  │
//! │  │ entitlement   │        │ orders               │  │
//! │  │  resolver     │        │  lifecycle controller│  │
//! │  │  grants       │        │  transition table    │  │
//! │  │  expiry sweep │        │  conditional update  │  │
//! │  └──────┬────────┘        └──────────┬───────────┘  │
//! │         └───────────┬────────────────┘              │
//! │                     ▼                               │
//! │        notification dispatch (fire-and-forget)      │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use gasmarket_core::entitlement::{
//!     EntitlementStatus, PolicyTerms, PricingPolicy, PrincipalEntitlementState, PrincipalRole,
//!     resolve,
//! };
//! use rust_decimal::Decimal;
//!
//! let policy = PricingPolicy {
//!     role: PrincipalRole::Buyer,
//!     is_active: true,
//!     grace_period_days: 3,
//!     terms: PolicyTerms::Buyer {
//!         access_price_unit: Decimal::new(500, 0),
//!         access_duration_hours: 24,
//!     },
//! };
//!
//! let state = PrincipalEntitlementState::default();
//! let status = resolve(&state, &policy, Utc::now());
//!
//! assert_eq!(status, EntitlementStatus::NoAccess { free_trial_used: false });
//! ```
//!
//! # Module Organization
//!
//! - [`entitlement`]: pricing policies, entitlement resolution, grants, and
//!   the recurring expiry sweep
//! - [`orders`]: order model, transition table, and the lifecycle controller
//! - [`notify`]: notification events and the dispatch seam
//! - [`error`]: error types shared across the crate

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod entitlement;
pub mod error;
pub mod notify;
pub mod orders;

pub use error::{MarketError, Result};
