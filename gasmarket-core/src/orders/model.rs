//! Order data model and transition table.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    entitlement::principal::PrincipalId,
    error::{MarketError, Result},
};

/// Unique identifier for an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Creates a new order ID after validation.
    ///
    /// # Errors
    ///
    /// Returns error if the ID is empty, exceeds 64 characters, or contains
    /// characters outside alphanumerics, hyphens, and underscores.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(MarketError::InvalidId("order id cannot be empty".into()));
        }
        if id.len() > 64 {
            return Err(MarketError::InvalidId("order id must be 64 characters or less".into()));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(MarketError::InvalidId(
                "order id can only contain alphanumeric characters, hyphens, and underscores"
                    .into(),
            ));
        }
        Ok(Self(id))
    }

    /// Generates a fresh random order ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("ord-{}", Uuid::new_v4()))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of an order in its fulfillment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created by the buyer, awaiting the seller's decision.
    Pending,
    /// Seller committed to fulfill.
    Accepted,
    /// Bottles are being prepared.
    Preparing,
    /// Out for delivery.
    InDelivery,
    /// Delivered and closed.
    Completed,
    /// Declined by the seller.
    Rejected,
    /// Withdrawn by the buyer before acceptance.
    Cancelled,
}

impl OrderStatus {
    /// Statuses the order may legally move to from `self`.
    ///
    /// This table is the single source of truth for transition legality;
    /// terminal statuses map to the empty set.
    #[must_use]
    pub fn allowed_next(self) -> &'static [OrderStatus] {
        match self {
            Self::Pending => &[Self::Accepted, Self::Rejected],
            Self::Accepted => &[Self::Preparing],
            Self::Preparing => &[Self::InDelivery],
            Self::InDelivery => &[Self::Completed],
            Self::Completed | Self::Rejected | Self::Cancelled => &[],
        }
    }

    /// True when no further transition is legal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Whether moving to `target` is legal from `self`.
    #[must_use]
    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_next().contains(&target)
    }

    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Preparing => "preparing",
            Self::InDelivery => "in_delivery",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineItem {
    /// Product identifier in the seller's catalog.
    pub product_id: String,
    /// Quantity ordered.
    pub quantity: u32,
    /// Unit price at order time.
    pub unit_price: Decimal,
}

/// A purchase order placed by a buyer against one seller's catalog.
///
/// Once the status reaches a terminal value the order is immutable; it is
/// never deleted, only terminated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier.
    pub id: OrderId,
    /// Buyer who placed the order.
    pub buyer_id: PrincipalId,
    /// Reseller who must act on it.
    pub seller_id: PrincipalId,
    /// Lifecycle position.
    pub status: OrderStatus,
    /// Ordered lines, in the sequence the buyer added them.
    pub items: Vec<OrderLineItem>,
    /// Total amount for all lines.
    pub total: Decimal,
    /// Seller's fulfillment estimate, free-form (e.g. "30min").
    pub estimated_time: Option<String>,
    /// Seller's reason when the order was rejected.
    pub rejection_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Acceptance timestamp.
    pub accepted_at: Option<DateTime<Utc>>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Input for creating an order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
    /// Buyer placing the order.
    pub buyer_id: PrincipalId,
    /// Reseller the order is placed against.
    pub seller_id: PrincipalId,
    /// Ordered lines.
    pub items: Vec<OrderLineItem>,
}

impl OrderDraft {
    /// Materializes the draft into a pending order.
    #[must_use]
    pub fn into_order(self, id: OrderId, created_at: DateTime<Utc>) -> Order {
        let total = self
            .items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum();
        Order {
            id,
            buyer_id: self.buyer_id,
            seller_id: self.seller_id,
            status: OrderStatus::Pending,
            items: self.items,
            total,
            estimated_time: None,
            rejection_reason: None,
            created_at,
            accepted_at: None,
            completed_at: None,
        }
    }
}
