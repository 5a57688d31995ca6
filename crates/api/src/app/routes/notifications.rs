use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use courier_core::NotificationId;
use courier_infra::InboxEntry;

use crate::app::errors::{ApiError, parse_id};
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read-all", post(mark_all_read))
        .route("/:id/read", post(mark_read))
}

pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Result<Json<Vec<InboxEntry>>, ApiError> {
    Ok(Json(services.inbox.list(ctx.actor()).await?))
}

pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: NotificationId = parse_id(&id)?;
    services.inbox.mark_read(ctx.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = services.inbox.mark_all_read(ctx.actor()).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}
