use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;

use courier_core::{OrderId, StoreId};
use courier_orders::Order;
use courier_stores::{OwnerOverride, Store};

use crate::app::dto::{AcceptOrderRequest, ApiJson, OverrideStatusRequest, ReasonRequest};
use crate::app::errors::{ApiError, parse_id};
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/orders", get(common::list_orders))
        .route("/orders/:id", get(common::get_order))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/reject", post(reject_order))
        .route("/orders/:id/ready", post(mark_ready))
        .route("/stores/:id/override-status", put(set_override_status))
}

pub async fn accept_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AcceptOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let order = services
        .orders
        .accept(ctx.actor(), order_id, body.preparation_time_minutes, Utc::now())
        .await?;
    Ok(Json(order))
}

pub async fn reject_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReasonRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let order = services
        .orders
        .reject(ctx.actor(), order_id, body.reason, Utc::now())
        .await?;
    Ok(Json(order))
}

pub async fn mark_ready(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(services.orders.mark_ready(ctx.actor(), order_id, Utc::now()).await?))
}

/// Owners may only close their store or hand it back to the schedule.
pub async fn set_override_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<OverrideStatusRequest>,
) -> Result<Json<Store>, ApiError> {
    let store_id: StoreId = parse_id(&id)?;
    let status: OwnerOverride = body.status.parse()?;
    let store = services
        .stores
        .set_owner_override(ctx.actor(), store_id, status)
        .await?;
    Ok(Json(store))
}
