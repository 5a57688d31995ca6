//! Order lifecycle.
//!
//! The [`Order`] aggregate is the state machine: every transition is a
//! command, checked against the single table in [`transition`], and produces
//! events that describe the state change together with its side effects
//! (stock to restore, parties to notify). Persistence and notification
//! delivery happen outside this crate.

pub mod notify;
pub mod order;
pub mod placement;
pub mod status;
pub mod transition;

pub use notify::{Notice, Recipient, audience_for};
pub use order::{
    AcceptOrder, AssignWorker, CancelOrder, ForceCancelOrder, MarkDelivered, MarkReady, Order,
    OrderCommand, OrderEvent, OrderHeader, OrderLine, PlaceOrder, RejectAssignment, RejectOrder,
    StartDelivery, StockMovement,
};
pub use placement::{CartLine, CatalogProduct, PlacementRequest, plan_placement};
pub use status::OrderStatus;
pub use transition::{Transition, TransitionRejection};
