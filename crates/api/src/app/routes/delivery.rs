use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use courier_core::OrderId;
use courier_orders::Order;

use crate::app::dto::{ApiJson, ReasonRequest, StartDeliveryRequest};
use crate::app::errors::{ApiError, parse_id};
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/orders", get(common::list_orders))
        .route("/orders/:id", get(common::get_order))
        .route("/orders/:id/start", post(start_delivery))
        .route("/orders/:id/reject", post(reject_assignment))
        .route("/orders/:id/delivered", post(mark_delivered))
}

pub async fn start_delivery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StartDeliveryRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let order = services
        .orders
        .start_delivery(ctx.actor(), order_id, body.estimated_arrival_time, Utc::now())
        .await?;
    Ok(Json(order))
}

/// Hand the order back to the ready pool with a reason.
pub async fn reject_assignment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ReasonRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let order = services
        .orders
        .reject_assignment(ctx.actor(), order_id, body.reason, Utc::now())
        .await?;
    Ok(Json(order))
}

pub async fn mark_delivered(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(services.orders.mark_delivered(ctx.actor(), order_id, Utc::now()).await?))
}
