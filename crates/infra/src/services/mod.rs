//! Application services.
//!
//! Each service method is one unit of work: it loads what it needs, lets the
//! domain decide, persists the outcome in a single `MarketTx` and only then
//! fires side effects that may fail independently (pushes).

pub mod actors;
pub mod commission;
pub mod inbox;
pub mod orders;
pub mod stores;

pub use actors::ActorResolver;
pub use commission::CommissionService;
pub use inbox::InboxService;
pub use orders::{NewOrder, OrderQuery, OrderWorkflow};
pub use stores::StoreAdminService;

use crate::error::ServiceError;
use crate::repository::MarketTx;

/// Roll back after a failed unit of work and hand the original error back.
pub(crate) async fn abort(tx: Box<dyn MarketTx>, err: ServiceError) -> ServiceError {
    if let Err(rollback_err) = tx.rollback().await {
        tracing::error!(error = %rollback_err, cause = %err, "rollback failed");
    }
    err
}
