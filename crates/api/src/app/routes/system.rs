use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use courier_auth::Actor;
use courier_core::StoreId;
use courier_stores::AvailabilityDecision;

use crate::app::errors::{ApiError, parse_id};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<ActorContext>) -> Json<Actor> {
    Json(ctx.actor().clone())
}

/// Open to any authenticated caller.
pub async fn store_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<AvailabilityDecision>, ApiError> {
    let store_id: StoreId = parse_id(&id)?;
    Ok(Json(services.stores.availability(store_id, Utc::now()).await?))
}
