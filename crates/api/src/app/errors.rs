use core::str::FromStr;

use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use courier_auth::Role;
use courier_core::DomainError;
use courier_infra::{ServiceError, StoreError};

/// Seconds a client should wait before retrying after a lock timeout.
const RETRY_AFTER_SECS: &str = "1";

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid bearer token")]
    Unauthenticated,

    /// The caller's role can never use this endpoint, whatever the resource.
    #[error("role '{0}' may not use this endpoint")]
    Forbidden(Role),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Service(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated => {
                json_error(StatusCode::UNAUTHORIZED, "unauthenticated", self.to_string())
            }
            ApiError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Service(err) => service_error_to_response(err),
        }
    }
}

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Domain(err) => domain_error_to_response(err),
        ServiceError::Store(StoreError::Timeout(msg)) => {
            tracing::warn!(reason = %msg, "request timed out waiting for a lock");
            let mut res = json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "timeout",
                "the resource is busy, retry shortly",
            );
            res.headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
            res
        }
        ServiceError::Store(StoreError::Conflict(msg)) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Store(err @ (StoreError::Database(_) | StoreError::Serialization(_))) => {
            tracing::error!(error = %err, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "internal storage error",
            )
        }
        ServiceError::NothingToBill(msg) => json_error(StatusCode::NOT_FOUND, "nothing_to_bill", msg),
    }
}

fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound | DomainError::Unauthorized => json_error(
            StatusCode::NOT_FOUND,
            "not_found_or_forbidden",
            DomainError::Unauthorized.to_string(),
        ),
        DomainError::Precondition { current, message } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "precondition_failed",
                "message": message,
                "current_status": current,
            })),
        )
            .into_response(),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Configuration(msg) => {
            tracing::error!(reason = %msg, "server configuration fault");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", msg)
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path or query identifier, reporting garbage as `invalid_id`.
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    Ok(raw.trim().parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::OrderId;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn precondition_carries_current_status() {
        let err = ApiError::from(DomainError::Precondition {
            current: "delivered".into(),
            message: "order can no longer be cancelled".into(),
        });
        let res = err.into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let body = body_json(res).await;
        assert_eq!(body["error"], "precondition_failed");
        assert_eq!(body["current_status"], "delivered");
    }

    #[tokio::test]
    async fn missing_and_foreign_resources_look_the_same() {
        let a = body_json(ApiError::from(DomainError::NotFound).into_response()).await;
        let b = body_json(ApiError::from(DomainError::Unauthorized).into_response()).await;
        assert_eq!(a, b);
        assert_eq!(a["error"], "not_found_or_forbidden");
    }

    #[test]
    fn timeouts_ask_the_client_to_retry() {
        let res = ApiError::from(ServiceError::from(StoreError::Timeout("lock".into()))).into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.headers().get(RETRY_AFTER).unwrap(), RETRY_AFTER_SECS);
    }

    #[test]
    fn status_codes_by_variant() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (DomainError::validation("bad").into(), StatusCode::BAD_REQUEST),
            (DomainError::configuration("no row").into(), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::Conflict("dup".into()).into(), StatusCode::CONFLICT),
            (
                ServiceError::from(StoreError::Conflict("dup".into())).into(),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::NothingToBill("empty".into()).into(),
                StatusCode::NOT_FOUND,
            ),
            (ApiError::Forbidden(Role::Customer), StatusCode::FORBIDDEN),
            (ApiError::Unauthenticated, StatusCode::UNAUTHORIZED),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn garbage_ids_are_rejected() {
        assert!(matches!(
            parse_id::<OrderId>("not-a-uuid"),
            Err(ApiError::Service(ServiceError::Domain(DomainError::InvalidId(_))))
        ));
        let id = OrderId::new();
        assert_eq!(parse_id::<OrderId>(&id.to_string()).unwrap(), id);
    }
}
