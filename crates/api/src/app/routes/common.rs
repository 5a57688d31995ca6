//! Order reads shared by every role-specific router.
//!
//! Which orders come back is decided by the caller's role and scope, so the
//! same handlers serve customers, owners, workers, admins and branch managers.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::Json;

use courier_core::OrderId;
use courier_orders::Order;

use crate::app::dto::ListOrdersParams;
use crate::app::errors::{ApiError, parse_id};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let query = params.into_query()?;
    let orders = services.orders.list_orders(ctx.actor(), &query).await?;
    Ok(Json(orders))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(services.orders.get_order(ctx.actor(), order_id).await?))
}
