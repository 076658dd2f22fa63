use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use num_traits::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use shared::*;
use uuid::Uuid;

use crate::fetch::HttpFeedFetcher;
use crate::handlers::{BookingAttempt, BookingManager, NewBookingRequest};
use crate::store::PgStore;
use crate::sync::SyncOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub manager: std::sync::Arc<BookingManager<PgStore>>,
    pub orchestrator: std::sync::Arc<SyncOrchestrator<PgStore, HttpFeedFetcher>>,
}

#[derive(Debug, Deserialize)]
pub struct StayQuery {
    pub room_id: Uuid,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub nights: i64,
    pub room_total: bigdecimal::BigDecimal,
    pub cleaning_fee: bigdecimal::BigDecimal,
    pub total: bigdecimal::BigDecimal,
    pub average_night: f64,
}

#[derive(Debug, Deserialize)]
pub struct PaymentWebhook {
    pub booking_id: Uuid,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub room_id: Uuid,
    pub date: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub room_id: Uuid,
    pub date: NaiveDate,
    pub block_type: BlockType,
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    pub room_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(e: Error) -> ApiError {
    let status = match e {
        Error::InvalidRange | Error::PriceOutOfRange { .. } => StatusCode::BAD_REQUEST,
        Error::RoomNotFound(_) | Error::BookingNotFound(_) => StatusCode::NOT_FOUND,
        Error::ConfirmConflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/availability/check", post(check_availability))
        .route("/quotes", post(quote_stay))
        .route("/bookings", post(create_booking))
        .route("/bookings/:id", get(get_booking))
        .route("/payments/webhook", post(payment_webhook))
        .route("/sync", post(trigger_sync))
        .route("/admin/price-override", post(set_price_override))
        .route("/admin/block", post(set_block))
        .route("/admin/clear", post(clear_date))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn check_availability(
    State(state): State<AppState>,
    Json(query): Json<StayQuery>,
) -> Result<Json<AvailabilityReport>, ApiError> {
    state
        .manager
        .check_availability(query.room_id, query.check_in, query.check_out)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn quote_stay(
    State(state): State<AppState>,
    Json(query): Json<StayQuery>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let quote = state
        .manager
        .quote(query.room_id, query.check_in, query.check_out)
        .await
        .map_err(error_response)?;
    Ok(Json(QuoteResponse {
        nights: quote.nights,
        average_night: quote.average_night.to_f64().unwrap_or(0.0),
        room_total: quote.room_total,
        cleaning_fee: quote.cleaning_fee,
        total: quote.total,
    }))
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BookingResponse {
    Created { booking: Booking },
    Rejected { available: bool, conflicts: Vec<Conflict> },
}

pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<NewBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError> {
    match state
        .manager
        .create_booking(request)
        .await
        .map_err(error_response)?
    {
        BookingAttempt::Created(booking) => Ok((
            StatusCode::CREATED,
            Json(BookingResponse::Created { booking }),
        )),
        BookingAttempt::Rejected(report) => Ok((
            StatusCode::CONFLICT,
            Json(BookingResponse::Rejected {
                available: report.available,
                conflicts: report.conflicts,
            }),
        )),
    }
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, ApiError> {
    state
        .manager
        .booking(id)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(webhook): Json<PaymentWebhook>,
) -> Result<Json<Booking>, ApiError> {
    state
        .manager
        .apply_payment_outcome(webhook.booking_id, webhook.outcome)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn trigger_sync(
    State(state): State<AppState>,
) -> Result<Json<SyncReport>, ApiError> {
    state
        .orchestrator
        .sync_all()
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn set_price_override(
    State(state): State<AppState>,
    Json(request): Json<OverrideRequest>,
) -> Result<StatusCode, ApiError> {
    let amount = bigdecimal::BigDecimal::from_f64(request.amount).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "amount is not a representable number".to_string(),
            }),
        )
    })?;
    state
        .manager
        .set_price_override(request.room_id, request.date, amount)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

pub async fn set_block(
    State(state): State<AppState>,
    Json(request): Json<BlockRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .manager
        .set_block(request.room_id, request.date, request.block_type)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

pub async fn clear_date(
    State(state): State<AppState>,
    Json(request): Json<ClearRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .manager
        .clear_date(request.room_id, request.date)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(error_response)
}

pub async fn health_check() -> &'static str {
    "OK"
}
