use axum::{
    routing::{get, post, put},
    Router,
};

use crate::app::routes::{admin, common};

/// Region-scoped subset of the admin operations.
pub fn router() -> Router {
    Router::new()
        .route("/orders", get(common::list_orders))
        .route("/orders/:id", get(common::get_order))
        .route("/orders/:id/assign", post(admin::assign_worker))
        .route("/orders/:id/force-cancel", post(admin::force_cancel))
        .route("/stores/:id/activation", put(admin::set_activation))
}
