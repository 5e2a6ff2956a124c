use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::Session;
use crate::db::queries::{self, BookingWithParty, Party, DATE_FORMAT, TIME_FORMAT, TS_FORMAT};
use crate::errors::AppError;
use crate::handlers::json::{JsonBody, OptionalJson};
use crate::models::{Booking, BookingEvent, BookingStatus, JobTab, Role};
use crate::services::bookings::{self, NewBooking};
use crate::services::lifecycle::Command;
use crate::services::payment::{self, PaymentLink};
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    customer_id: String,
    provider_id: String,
    booking_date: String,
    booking_time: String,
    address: String,
    description: Option<String>,
    status: String,
    tab: JobTab,
    payment_method: String,
    payment_status: String,
    price: Option<i64>,
    payment_source: Option<String>,
    transaction_id: Option<String>,
    rating: Option<u8>,
    review_text: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    party: Option<Party>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            customer_id: b.customer_id,
            provider_id: b.provider_id,
            booking_date: b.booking_date.format(DATE_FORMAT).to_string(),
            booking_time: b.booking_time.format(TIME_FORMAT).to_string(),
            address: b.address,
            description: b.description,
            status: b.status.as_str().to_string(),
            tab: JobTab::of(b.status),
            payment_method: b.payment_method.as_str().to_string(),
            payment_status: b.payment_status.as_str().to_string(),
            price: b.price,
            payment_source: b.payment_source,
            transaction_id: b.transaction_id,
            rating: b.rating,
            review_text: b.review_text,
            version: b.version,
            created_at: b.created_at.format(TS_FORMAT).to_string(),
            updated_at: b.updated_at.format(TS_FORMAT).to_string(),
            party: None,
        }
    }
}

impl From<BookingWithParty> for BookingResponse {
    fn from(row: BookingWithParty) -> Self {
        let mut response = BookingResponse::from(row.booking);
        response.party = Some(row.party);
        response
    }
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    session: Session,
    JsonBody(body): JsonBody<NewBooking>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let (booking, created) = bookings::create_booking(&state, &session, body)?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(booking.into())))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub tab: Option<JobTab>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings: Vec<BookingResponse> = {
        let db = state.db()?;
        match session.role {
            Role::Customer => queries::list_customer_bookings(&db, &session.user_id)?
                .into_iter()
                .map(Into::into)
                .collect(),
            Role::Provider => queries::list_provider_bookings(&db, &session.user_id, query.tab)?
                .into_iter()
                .map(Into::into)
                .collect(),
            Role::Admin => {
                let status = match query.status.as_deref() {
                    Some(s) => Some(BookingStatus::parse(s).ok_or_else(|| {
                        AppError::BadRequest(format!("unknown status: {s}"))
                    })?),
                    None => None,
                };
                let limit = query.limit.unwrap_or(50).clamp(1, 500);
                queries::list_all_bookings(&db, status, limit)?
                    .into_iter()
                    .map(Into::into)
                    .collect()
            }
        }
    };

    Ok(Json(bookings))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = bookings::get_booking(&state, &session, &id)?;
    Ok(Json(booking.into()))
}

// GET /api/bookings/:id/events
pub async fn get_booking_events(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Vec<BookingEvent>>, AppError> {
    Ok(Json(bookings::booking_history(&state, &session, &id)?))
}

// ── Lifecycle ──

#[derive(Deserialize, Default)]
pub struct VersionedRequest {
    pub expected_version: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct AcceptRequest {
    pub price: Option<i64>,
    pub expected_version: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct CompleteRequest {
    pub price: Option<i64>,
    #[serde(default)]
    pub cash_collected: bool,
    pub expected_version: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct ClaimRequest {
    pub source: Option<String>,
    pub expected_version: Option<i64>,
}

#[derive(Deserialize)]
pub struct RatingRequest {
    pub rating: u8,
    pub review_text: Option<String>,
    pub expected_version: Option<i64>,
}

fn run(
    state: &Arc<AppState>,
    session: &Session,
    id: &str,
    command: Command,
    expected_version: Option<i64>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = bookings::run_command(state, session, id, command, expected_version)?;
    Ok(Json(booking.into()))
}

// POST /api/bookings/:id/accept
pub async fn accept_booking(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<AcceptRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    run(
        &state,
        &session,
        &id,
        Command::Accept { price: body.price },
        body.expected_version,
    )
}

// POST /api/bookings/:id/decline
pub async fn decline_booking(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<VersionedRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    run(&state, &session, &id, Command::Decline, body.expected_version)
}

// POST /api/bookings/:id/start
pub async fn start_booking(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<VersionedRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    run(&state, &session, &id, Command::Start, body.expected_version)
}

// POST /api/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<CompleteRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    run(
        &state,
        &session,
        &id,
        Command::Complete {
            price: body.price,
            cash_collected: body.cash_collected,
        },
        body.expected_version,
    )
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<VersionedRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    run(&state, &session, &id, Command::Cancel, body.expected_version)
}

// ── Payment ──

// POST /api/bookings/:id/payment/claim
pub async fn claim_payment(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<ClaimRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    run(
        &state,
        &session,
        &id,
        Command::ClaimPayment {
            source: body.source,
        },
        body.expected_version,
    )
}

// POST /api/bookings/:id/payment/confirm
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<VersionedRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    run(&state, &session, &id, Command::ConfirmPayment, body.expected_version)
}

// POST /api/bookings/:id/payment/reject
pub async fn reject_payment(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    OptionalJson(body): OptionalJson<VersionedRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    run(&state, &session, &id, Command::RejectPayment, body.expected_version)
}

// GET /api/bookings/:id/payment/link
pub async fn payment_link(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<PaymentLink>, AppError> {
    let booking = bookings::get_booking(&state, &session, &id)?;
    if booking.customer_id != session.user_id {
        return Err(AppError::Forbidden(
            "only the customer on this booking may pay".to_string(),
        ));
    }
    Ok(Json(payment::payment_link(&state.config, &booking)?))
}

// ── Rating ──

// POST /api/bookings/:id/rating
pub async fn rate_booking(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<RatingRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    run(
        &state,
        &session,
        &id,
        Command::Rate {
            rating: body.rating,
            review_text: body.review_text,
        },
        body.expected_version,
    )
}
