//! Seller- and buyer-driven order lifecycle transitions.
//!
//! Every operation follows the same shape: authorization check first,
//! legality check second, then one atomic conditional update, then one
//! notification to the counterpart party. The ordering matters: an actor
//! who does not own the order learns nothing about its current status.

use std::{fmt, sync::Arc};

use chrono::Utc;
use tracing::{info, instrument};

use super::{
    model::{Order, OrderDraft, OrderId, OrderStatus},
    store::{OrderStore, OrderTransition},
};
use crate::{
    entitlement::principal::PrincipalId,
    error::{MarketError, Result},
    notify::{NotificationDispatcher, NotificationEvent},
};

/// State machine governing an order from creation to termination.
#[derive(Clone)]
pub struct OrderLifecycleController {
    store: Arc<dyn OrderStore>,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl fmt::Debug for OrderLifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderLifecycleController").finish_non_exhaustive()
    }
}

impl OrderLifecycleController {
    /// Creates a controller over the given collaborators.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        Self { store, notifier }
    }

    /// Creates a new pending order from a buyer's draft.
    ///
    /// # Errors
    ///
    /// Returns error if the store rejects the insert.
    #[instrument(skip(self, draft), fields(buyer = %draft.buyer_id, seller = %draft.seller_id))]
    pub fn create(&self, draft: OrderDraft) -> Result<Order> {
        let order = draft.into_order(OrderId::generate(), Utc::now());
        self.store.insert(order.clone())?;
        info!(order = %order.id, "order created");
        Ok(order)
    }

    /// Accepts a pending order with a fulfillment estimate.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` if no such order exists, `Forbidden` if
    /// `actor` is not the owning seller, and `InvalidTransition` if the
    /// order is no longer pending.
    #[instrument(skip(self, estimated_time), fields(order = %order_id, actor = %actor))]
    pub fn accept(
        &self,
        order_id: &OrderId,
        actor: &PrincipalId,
        estimated_time: &str,
    ) -> Result<Order> {
        let order = self.store.get(order_id)?;
        check_seller(&order, actor)?;

        let transition = OrderTransition::to(OrderStatus::Accepted)
            .with_estimated_time(estimated_time)
            .with_accepted_at(Utc::now());
        let order = self.store.apply_if_status(order_id, OrderStatus::Pending, transition)?;

        info!(order = %order.id, "order accepted");
        self.notifier.dispatch(NotificationEvent::OrderAccepted {
            order_id: order.id.clone(),
            buyer_id: order.buyer_id.clone(),
            estimated_time: order.estimated_time.clone(),
        });
        Ok(order)
    }

    /// Rejects a pending order with a reason.
    ///
    /// # Errors
    ///
    /// Same preconditions as [`accept`](Self::accept).
    #[instrument(skip(self, reason), fields(order = %order_id, actor = %actor))]
    pub fn reject(&self, order_id: &OrderId, actor: &PrincipalId, reason: &str) -> Result<Order> {
        let order = self.store.get(order_id)?;
        check_seller(&order, actor)?;

        let transition =
            OrderTransition::to(OrderStatus::Rejected).with_rejection_reason(reason);
        let order = self.store.apply_if_status(order_id, OrderStatus::Pending, transition)?;

        info!(order = %order.id, "order rejected");
        self.notifier.dispatch(NotificationEvent::OrderRejected {
            order_id: order.id.clone(),
            buyer_id: order.buyer_id.clone(),
            reason: reason.to_owned(),
        });
        Ok(order)
    }

    /// Moves an order to `target` along the transition table.
    ///
    /// On the transition into `Completed` the completion timestamp is
    /// stamped.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound`, `Forbidden` for a non-owning actor, and
    /// `InvalidTransition` when `target` is not in the allowed-next set of
    /// the order's current status.
    #[instrument(skip(self), fields(order = %order_id, actor = %actor, %target))]
    pub fn advance(
        &self,
        order_id: &OrderId,
        actor: &PrincipalId,
        target: OrderStatus,
    ) -> Result<Order> {
        let order = self.store.get(order_id)?;
        check_seller(&order, actor)?;
        if !order.status.can_transition_to(target) {
            return Err(MarketError::InvalidTransition { from: order.status, to: target });
        }

        let mut transition = OrderTransition::to(target);
        if target == OrderStatus::Accepted {
            transition = transition.with_accepted_at(Utc::now());
        }
        if target == OrderStatus::Completed {
            transition = transition.with_completed_at(Utc::now());
        }
        let order = self.store.apply_if_status(order_id, order.status, transition)?;

        info!(order = %order.id, status = %order.status, "order advanced");
        self.notifier.dispatch(NotificationEvent::OrderProgressed {
            order_id: order.id.clone(),
            buyer_id: order.buyer_id.clone(),
            status: order.status,
        });
        Ok(order)
    }

    /// Cancels a pending order on the buyer's behalf.
    ///
    /// # Errors
    ///
    /// Returns `Forbidden` when `actor` is not the buyer who placed the
    /// order and `InvalidTransition` once the seller has already acted.
    #[instrument(skip(self), fields(order = %order_id, actor = %actor))]
    pub fn cancel(&self, order_id: &OrderId, actor: &PrincipalId) -> Result<Order> {
        let order = self.store.get(order_id)?;
        if order.buyer_id != *actor {
            return Err(MarketError::Forbidden(format!(
                "{actor} is not the buyer of order {order_id}"
            )));
        }

        let order = self.store.apply_if_status(
            order_id,
            OrderStatus::Pending,
            OrderTransition::to(OrderStatus::Cancelled),
        )?;

        info!(order = %order.id, "order cancelled");
        self.notifier.dispatch(NotificationEvent::OrderCancelled {
            order_id: order.id.clone(),
            seller_id: order.seller_id.clone(),
        });
        Ok(order)
    }
}

fn check_seller(order: &Order, actor: &PrincipalId) -> Result<()> {
    if order.seller_id != *actor {
        return Err(MarketError::Forbidden(format!(
            "{actor} is not the seller of order {}",
            order.id
        )));
    }
    Ok(())
}
