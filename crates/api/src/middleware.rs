use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use courier_auth::{JwtValidator, Role};
use courier_infra::ActorResolver;

use crate::app::errors::ApiError;
use crate::context::ActorContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub actors: ActorResolver,
}

/// Verify the bearer token and attach the resolved [`ActorContext`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers()).ok_or(ApiError::Unauthenticated)?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::Unauthenticated
    })?;

    let actor = state.actors.resolve(&claims).await?;
    req.extensions_mut().insert(ActorContext::new(actor));

    Ok(next.run(req).await)
}

/// Route guard for role-specific routers. Runs after [`auth_middleware`].
pub async fn require_role(
    State(allowed): State<&'static [Role]>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let role = req
        .extensions()
        .get::<ActorContext>()
        .map(ActorContext::role)
        .ok_or(ApiError::Unauthenticated)?;

    if !allowed.contains(&role) {
        return Err(ApiError::Forbidden(role));
    }
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
