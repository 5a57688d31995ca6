//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: repository selection and the application services
//! - `routes/`: one router per role plus the shared order reads
//! - `dto.rs`: request DTOs and the JSON extractor
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router over already-wired services.
pub fn build_app_with(services: AppServices, jwt_secret: String) -> Router {
    let jwt = Arc::new(courier_auth::Hs256JwtValidator::new(jwt_secret.into_bytes()));
    let auth_state = middleware::AuthState {
        jwt,
        actors: services.actors.clone(),
    };

    // Protected routes: bearer token, then actor resolution.
    let protected = routes::router()
        .layer(Extension(Arc::new(services)))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
