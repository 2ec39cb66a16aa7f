//! Order lifecycle state machine.
//!
//! An order moves from creation through completion, rejection, or
//! cancellation under two authorization domains: the buyer who created it
//! and the reseller who must act on it. Legality lives in one explicit
//! transition table; atomicity lives in the store's conditional update.

pub mod controller;
pub mod model;
pub mod store;

pub use controller::OrderLifecycleController;
pub use model::{Order, OrderDraft, OrderId, OrderLineItem, OrderStatus};
pub use store::{InMemoryOrderStore, OrderStore, OrderTransition};
