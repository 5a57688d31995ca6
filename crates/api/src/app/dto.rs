use axum::extract::{FromRequest, Request, rejection::JsonRejection};
use axum::{Json, async_trait};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use courier_core::{Money, StoreId, UserId};

use crate::app::errors::{ApiError, parse_id};

/// `Json` whose rejections come back as structured 400s.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// A decimal sent either as a JSON number or a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Decimal {
    Number(serde_json::Number),
    Text(String),
}

impl Decimal {
    pub fn as_text(&self) -> String {
        match self {
            Decimal::Number(n) => n.to_string(),
            Decimal::Text(s) => s.clone(),
        }
    }
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct EstimateFeeRequest {
    pub items_subtotal: Money,
}

#[derive(Debug, Deserialize)]
pub struct AcceptOrderRequest {
    pub preparation_time_minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OptionalReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignWorkerRequest {
    pub delivery_worker_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct StartDeliveryRequest {
    pub estimated_arrival_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct OverrideStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub opening_time: Option<String>,
    #[serde(default)]
    pub closing_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommissionRateRequest {
    /// Percentage between 0 and 100.
    pub commission_rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ActivationRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub store_id: StoreId,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct FinalizeReportRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// Query string for the order listings. Each role honours a subset.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub store_id: Option<String>,
    pub customer_id: Option<String>,
    pub region_id: Option<String>,
}

impl ListOrdersParams {
    pub fn into_query(self) -> Result<courier_infra::OrderQuery, ApiError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<courier_orders::OrderStatus>)
            .transpose()?;
        let mut query = courier_infra::OrderQuery::with_status(status);
        query.store_id = self.store_id.as_deref().map(parse_id).transpose()?;
        query.customer_id = self.customer_id.as_deref().map(parse_id).transpose()?;
        query.region_id = self.region_id.as_deref().map(parse_id).transpose()?;
        Ok(query)
    }
}
