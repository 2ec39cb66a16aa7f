//! Order persistence seam with conditional-update semantics.
//!
//! The lifecycle controller never writes a status directly; it hands the
//! store a transition plus the status it expects the order to still hold.
//! The store applies both checks and the write as one indivisible
//! operation, which is what makes concurrent transitions on the same order
//! resolve to exactly one winner.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::model::{Order, OrderId, OrderStatus};
use crate::error::{MarketError, Result};

/// Mutation applied together with a status compare-and-swap.
#[derive(Debug, Clone)]
pub struct OrderTransition {
    /// Status the order moves to.
    pub to: OrderStatus,
    /// Fulfillment estimate to record, if any.
    pub estimated_time: Option<String>,
    /// Rejection reason to record, if any.
    pub rejection_reason: Option<String>,
    /// Acceptance timestamp to stamp, if any.
    pub accepted_at: Option<DateTime<Utc>>,
    /// Completion timestamp to stamp, if any.
    pub completed_at: Option<DateTime<Utc>>,
}

impl OrderTransition {
    /// Transition to `status` with no additional field changes.
    #[must_use]
    pub fn to(status: OrderStatus) -> Self {
        Self {
            to: status,
            estimated_time: None,
            rejection_reason: None,
            accepted_at: None,
            completed_at: None,
        }
    }

    /// Records the seller's fulfillment estimate.
    #[must_use]
    pub fn with_estimated_time<S: Into<String>>(mut self, estimated_time: S) -> Self {
        self.estimated_time = Some(estimated_time.into());
        self
    }

    /// Records the seller's rejection reason.
    #[must_use]
    pub fn with_rejection_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.rejection_reason = Some(reason.into());
        self
    }

    /// Stamps the acceptance timestamp.
    #[must_use]
    pub fn with_accepted_at(mut self, at: DateTime<Utc>) -> Self {
        self.accepted_at = Some(at);
        self
    }

    /// Stamps the completion timestamp.
    #[must_use]
    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }
}

/// Persistence collaborator for orders.
pub trait OrderStore: Send + Sync {
    /// Inserts a new order.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidId`] when the id is already taken.
    fn insert(&self, order: Order) -> Result<()>;

    /// Loads an order by id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::OrderNotFound`] if no such order exists.
    fn get(&self, id: &OrderId) -> Result<Order>;

    /// Atomically applies `transition` when the stored status equals
    /// `expected`.
    ///
    /// The compare and the write must be one indivisible operation per
    /// order; the loser of a concurrent race observes
    /// [`MarketError::InvalidTransition`] carrying the status that won.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::OrderNotFound`] or
    /// [`MarketError::InvalidTransition`].
    fn apply_if_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        transition: OrderTransition,
    ) -> Result<Order>;
}

/// In-memory order store.
///
/// Reference implementation of the conditional update: one write lock spans
/// the whole read-check-write sequence.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn insert(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write();
        if orders.contains_key(&order.id) {
            return Err(MarketError::InvalidId(format!("duplicate order id: {}", order.id)));
        }
        orders.insert(order.id.clone(), order);
        Ok(())
    }

    fn get(&self, id: &OrderId) -> Result<Order> {
        self.orders
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| MarketError::OrderNotFound(id.to_string()))
    }

    fn apply_if_status(
        &self,
        id: &OrderId,
        expected: OrderStatus,
        transition: OrderTransition,
    ) -> Result<Order> {
        let mut orders = self.orders.write();
        let order = orders.get_mut(id).ok_or_else(|| MarketError::OrderNotFound(id.to_string()))?;
        if order.status != expected {
            return Err(MarketError::InvalidTransition { from: order.status, to: transition.to });
        }
        order.status = transition.to;
        if let Some(estimated_time) = transition.estimated_time {
            order.estimated_time = Some(estimated_time);
        }
        if let Some(reason) = transition.rejection_reason {
            order.rejection_reason = Some(reason);
        }
        if let Some(at) = transition.accepted_at {
            order.accepted_at = Some(at);
        }
        if let Some(at) = transition.completed_at {
            order.completed_at = Some(at);
        }
        Ok(order.clone())
    }
}
