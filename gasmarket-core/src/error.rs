//! Error types for the gasmarket core.
//!
//! All errors implement the standard [`std::error::Error`] trait via
//! [`thiserror::Error`]. Every variant is a recoverable, typed outcome that
//! the surrounding CRUD layer maps onto its HTTP taxonomy: the not-found
//! kinds to 404, [`Forbidden`](MarketError::Forbidden) to 403, and
//! [`InvalidTransition`](MarketError::InvalidTransition) to 400 with the
//! current status included so the client can resynchronize its view.

use thiserror::Error;

use crate::{entitlement::principal::PrincipalRole, orders::model::OrderStatus};

/// Result type alias for core operations.
///
/// All fallible functions in this crate return this type.
pub type Result<T> = std::result::Result<T, MarketError>;

/// Errors that can occur in the gasmarket core.
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum MarketError {
    /// Referenced order does not exist.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// Referenced principal does not exist.
    #[error("principal not found: {0}")]
    PrincipalNotFound(String),

    /// Referenced subscription plan does not exist or is retired.
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    /// No pricing policy row is configured for the role.
    ///
    /// Access gating treats a missing policy identically to a disabled one
    /// (fail open, never lock out all traffic on a misconfiguration); this
    /// error only surfaces from the strict policy accessor.
    #[error("no pricing policy configured for role: {0}")]
    PolicyNotFound(PrincipalRole),

    /// Actor does not own the resource being mutated.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Requested state change violates the order transition table.
    ///
    /// Carries the status observed at decision time; under a concurrent
    /// race this is the status the winning transition produced.
    #[error("invalid order transition: {from} -> {to}")]
    InvalidTransition {
        /// Status the order held when the transition was attempted.
        from: OrderStatus,
        /// Status the transition tried to reach.
        to: OrderStatus,
    },

    /// Free trial was already consumed by this principal.
    #[error("free trial already used by principal: {0}")]
    TrialAlreadyUsed(String),

    /// Identifier failed validation.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
