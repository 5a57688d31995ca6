use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;

use courier_commission::{GeneratedReport, ReportPeriod};
use courier_core::{OrderId, ReportId, StoreId};
use courier_orders::Order;
use courier_pricing::PlatformDeliveryConfig;
use courier_stores::{AdminOverride, Store};

use crate::app::dto::{
    ActivationRequest, ApiJson, AssignWorkerRequest, CommissionRateRequest, FinalizeReportRequest,
    GenerateReportRequest, OptionalReasonRequest, OverrideStatusRequest, ScheduleRequest,
};
use crate::app::errors::{ApiError, parse_id};
use crate::app::routes::common;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/orders", get(common::list_orders))
        .route("/orders/:id", get(common::get_order))
        .route("/orders/:id/assign", post(assign_worker))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/force-cancel", post(force_cancel))
        .route("/stores/:id/override-status", put(set_override_status))
        .route("/stores/:id/schedule", put(set_schedule))
        .route("/stores/:id/commission-rate", put(set_commission_rate))
        .route("/stores/:id/activation", put(set_activation))
        .route("/delivery-config", get(get_delivery_config).put(replace_delivery_config))
        .route("/commission-reports", post(generate_report))
        .route("/commission-reports/:id", get(get_report))
        .route("/commission-reports/:id/finalize", post(finalize_report))
}

// -------------------------
// Orders
// -------------------------

/// Shared with the branch-manager router; scope is checked by the workflow.
pub async fn assign_worker(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AssignWorkerRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let order = services
        .orders
        .assign_worker(ctx.actor(), order_id, body.delivery_worker_id, Utc::now())
        .await?;
    Ok(Json(order))
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    Ok(Json(services.orders.cancel(ctx.actor(), order_id, Utc::now()).await?))
}

pub async fn force_cancel(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<OptionalReasonRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let order = services
        .orders
        .force_cancel(ctx.actor(), order_id, body.reason, Utc::now())
        .await?;
    Ok(Json(order))
}

// -------------------------
// Store settings
// -------------------------

pub async fn set_override_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<OverrideStatusRequest>,
) -> Result<Json<Store>, ApiError> {
    let store_id: StoreId = parse_id(&id)?;
    let status: AdminOverride = body.status.parse()?;
    let store = services
        .stores
        .set_admin_override(ctx.actor(), store_id, status)
        .await?;
    Ok(Json(store))
}

pub async fn set_schedule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ScheduleRequest>,
) -> Result<Json<Store>, ApiError> {
    let store_id: StoreId = parse_id(&id)?;
    let store = services
        .stores
        .set_schedule(ctx.actor(), store_id, body.opening_time, body.closing_time)
        .await?;
    Ok(Json(store))
}

pub async fn set_commission_rate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CommissionRateRequest>,
) -> Result<Json<Store>, ApiError> {
    let store_id: StoreId = parse_id(&id)?;
    let store = services
        .stores
        .set_commission_rate(ctx.actor(), store_id, &body.commission_rate.as_text())
        .await?;
    Ok(Json(store))
}

/// Shared with the branch-manager router.
pub async fn set_activation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ActivationRequest>,
) -> Result<Json<Store>, ApiError> {
    let store_id: StoreId = parse_id(&id)?;
    let store = services
        .stores
        .set_active(ctx.actor(), store_id, body.is_active)
        .await?;
    Ok(Json(store))
}

// -------------------------
// Delivery config
// -------------------------

pub async fn get_delivery_config(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Result<Json<PlatformDeliveryConfig>, ApiError> {
    Ok(Json(services.stores.delivery_config(ctx.actor()).await?))
}

pub async fn replace_delivery_config(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    ApiJson(body): ApiJson<PlatformDeliveryConfig>,
) -> Result<Json<PlatformDeliveryConfig>, ApiError> {
    let config = services
        .stores
        .replace_delivery_config(ctx.actor(), body)
        .await?;
    Ok(Json(config))
}

// -------------------------
// Commission reports
// -------------------------

pub async fn generate_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    ApiJson(body): ApiJson<GenerateReportRequest>,
) -> Result<(StatusCode, Json<GeneratedReport>), ApiError> {
    let period = ReportPeriod::parse(&body.start_date, &body.end_date)?;
    let report = services
        .commission
        .generate(ctx.actor(), body.store_id, period, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn get_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Json<GeneratedReport>, ApiError> {
    let report_id: ReportId = parse_id(&id)?;
    Ok(Json(services.commission.get_report(ctx.actor(), report_id).await?))
}

pub async fn finalize_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<FinalizeReportRequest>,
) -> Result<Json<GeneratedReport>, ApiError> {
    let report_id: ReportId = parse_id(&id)?;
    let report = services
        .commission
        .finalize(ctx.actor(), report_id, body.notes, Utc::now())
        .await?;
    Ok(Json(report))
}
