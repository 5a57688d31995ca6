use axum::{routing::get, Router};

use courier_auth::Role;

use crate::middleware::require_role;

pub mod admin;
pub mod branch_manager;
pub mod common;
pub mod customer;
pub mod delivery;
pub mod notifications;
pub mod store_owner;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stores/:id/availability", get(system::store_availability))
        .nest("/orders", for_roles(customer::router(), &[Role::Customer]))
        .nest("/store-owner", for_roles(store_owner::router(), &[Role::StoreOwner]))
        .nest("/delivery", for_roles(delivery::router(), &[Role::DeliveryWorker]))
        .nest("/admin", for_roles(admin::router(), &[Role::Admin]))
        .nest(
            "/branch-manager",
            for_roles(branch_manager::router(), &[Role::BranchManager]),
        )
        .nest("/notifications", notifications::router())
}

/// Other roles get 403 before any lookup happens.
fn for_roles(router: Router, roles: &'static [Role]) -> Router {
    router.route_layer(axum::middleware::from_fn_with_state(roles, require_role))
}
