//! Notification dispatch to buyers and resellers.
//!
//! Delivery (push/SMS) is owned by the surrounding platform. The core emits
//! exactly one event per successful state change and treats dispatch as
//! fire-and-forget: a lost notification never rolls back the transition
//! that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    entitlement::principal::PrincipalId,
    orders::model::{OrderId, OrderStatus},
};

/// Event emitted after a successful state change, addressed to the party
/// that did not perform it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// Seller accepted the order; notify the buyer.
    OrderAccepted {
        /// Order that changed.
        order_id: OrderId,
        /// Buyer to notify.
        buyer_id: PrincipalId,
        /// Seller's fulfillment estimate.
        estimated_time: Option<String>,
    },
    /// Seller rejected the order; notify the buyer.
    OrderRejected {
        /// Order that changed.
        order_id: OrderId,
        /// Buyer to notify.
        buyer_id: PrincipalId,
        /// Seller's stated reason.
        reason: String,
    },
    /// Seller moved the order forward; notify the buyer.
    OrderProgressed {
        /// Order that changed.
        order_id: OrderId,
        /// Buyer to notify.
        buyer_id: PrincipalId,
        /// Status the order reached.
        status: OrderStatus,
    },
    /// Buyer cancelled the order; notify the seller.
    OrderCancelled {
        /// Order that changed.
        order_id: OrderId,
        /// Seller to notify.
        seller_id: PrincipalId,
    },
    /// Trial window opened.
    TrialStarted {
        /// Principal whose window opened.
        principal_id: PrincipalId,
        /// End of the window.
        ends_at: DateTime<Utc>,
    },
    /// Paid window opened or extended.
    SubscriptionActivated {
        /// Principal whose window opened.
        principal_id: PrincipalId,
        /// End of the window.
        ends_at: DateTime<Utc>,
    },
    /// Subscription lapsed into its courtesy window.
    GracePeriodOpened {
        /// Principal whose window opened.
        principal_id: PrincipalId,
        /// End of the courtesy window.
        ends_at: DateTime<Utc>,
    },
    /// Courtesy window lapsed; expiry finalized.
    SubscriptionExpired {
        /// Principal whose access ended.
        principal_id: PrincipalId,
    },
}

/// Fire-and-forget dispatch seam to the platform's push/SMS delivery.
pub trait NotificationDispatcher: Send + Sync {
    /// Dispatches one event.
    ///
    /// Implementations must not block the caller on delivery; failures are
    /// theirs to log and retry.
    fn dispatch(&self, event: NotificationEvent);
}

/// Dispatcher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDispatcher;

impl NotificationDispatcher for NullDispatcher {
    fn dispatch(&self, _event: NotificationEvent) {}
}

/// Dispatcher that logs events instead of delivering them.
///
/// Stand-in until the delivery integration is wired; also useful in
/// development.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn dispatch(&self, event: NotificationEvent) {
        tracing::info!(?event, "notification dispatched");
    }
}
