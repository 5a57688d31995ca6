use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use courier_infra::NewOrder;
use courier_orders::Order;
use courier_pricing::FeeQuote;

use crate::app::dto::{ApiJson, EstimateFeeRequest};
use crate::app::errors::ApiError;
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order).get(common::list_orders))
        .route("/delivery-fee/estimate", post(estimate_fee))
        .route("/:id", get(common::get_order))
}

/// Turn the caller's cart for one store into an order.
pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    ApiJson(body): ApiJson<NewOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = services.orders.place_order(ctx.actor(), body, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn estimate_fee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    ApiJson(body): ApiJson<EstimateFeeRequest>,
) -> Result<Json<FeeQuote>, ApiError> {
    let quote = services
        .orders
        .estimate_fee(ctx.actor(), body.items_subtotal)
        .await?;
    Ok(Json(quote))
}
