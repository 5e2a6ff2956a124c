use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::auth::Session;
use crate::db::queries::{self, DATE_FORMAT, TIME_FORMAT};
use crate::errors::AppError;
use crate::models::{
    Booking, BookingEvent, BookingStatus, EventKind, PaymentMethod, PaymentStatus, Role,
};
use crate::services::events;
use crate::services::lifecycle::{self, Command};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewBooking {
    pub provider_id: String,
    pub booking_date: String,
    pub booking_time: String,
    pub address: String,
    pub description: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub request_id: Option<String>,
}

/// Customer submits a request. Returns the booking and whether it was newly
/// created; a repeated `request_id` returns the original booking instead.
pub fn create_booking(
    state: &Arc<AppState>,
    session: &Session,
    req: NewBooking,
) -> Result<(Booking, bool), AppError> {
    session.require(Role::Customer)?;

    let booking_date = NaiveDate::parse_from_str(req.booking_date.trim(), DATE_FORMAT)
        .map_err(|_| AppError::BadRequest("booking_date must be YYYY-MM-DD".to_string()))?;
    let booking_time = NaiveTime::parse_from_str(req.booking_time.trim(), TIME_FORMAT)
        .map_err(|_| AppError::BadRequest("booking_time must be HH:MM".to_string()))?;

    let now = Utc::now().naive_utc();
    if booking_date < now.date() {
        return Err(AppError::BadRequest(
            "booking_date cannot be in the past".to_string(),
        ));
    }

    let address = req.address.trim();
    if address.is_empty() {
        return Err(AppError::BadRequest("address is required".to_string()));
    }

    let request_id = req
        .request_id
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    let description = req
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let (booking, event) = {
        let mut db = state.db()?;

        if let Some(rid) = &request_id {
            if let Some(existing) = queries::find_booking_by_request(&db, &session.user_id, rid)? {
                tracing::info!(
                    booking_id = %existing.id,
                    request_id = %rid,
                    "duplicate booking request"
                );
                return Ok((existing, false));
            }
        }

        let bookable = queries::get_profile(&db, &req.provider_id)?
            .is_some_and(|p| p.role == Role::Provider && !p.is_suspended);
        if !bookable {
            return Err(AppError::NotFound("provider not found".to_string()));
        }

        let booking = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: session.user_id.clone(),
            provider_id: req.provider_id,
            booking_date,
            booking_time,
            address: address.to_string(),
            description,
            status: BookingStatus::Requested,
            payment_method: req.payment_method.unwrap_or_default(),
            payment_status: PaymentStatus::Pending,
            price: None,
            payment_source: None,
            transaction_id: None,
            rating: None,
            review_text: None,
            request_id,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let tx = db.transaction()?;
        queries::insert_booking(&tx, &booking)?;
        let event = queries::insert_event(&tx, &booking, EventKind::Created, &session.user_id)?;
        tx.commit()?;

        (booking, event)
    };

    tracing::info!(
        booking_id = %booking.id,
        customer_id = %booking.customer_id,
        provider_id = %booking.provider_id,
        "booking requested"
    );
    events::publish(state, event);

    Ok((booking, true))
}

/// Runs a lifecycle command against a stored booking. The write only lands
/// if nobody else changed the row since it was read; `expected_version`
/// lets the client pin the version it last saw.
pub fn run_command(
    state: &Arc<AppState>,
    session: &Session,
    booking_id: &str,
    command: Command,
    expected_version: Option<i64>,
) -> Result<Booking, AppError> {
    let now = Utc::now().naive_utc();
    let action = command.name();

    let (booking, event) = {
        let mut db = state.db()?;

        let current = queries::get_booking_by_id(&db, booking_id)?
            .filter(|b| can_view(b, session))
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

        if let Some(expected) = expected_version {
            if expected != current.version {
                return Err(AppError::Conflict(format!(
                    "booking is at version {}, not {expected}",
                    current.version
                )));
            }
        }

        let transition = lifecycle::apply(&current, session.actor(), command, now)?;

        let tx = db.transaction()?;
        if !queries::update_booking(&tx, &transition.booking, current.version)? {
            return Err(AppError::Conflict(
                "booking was changed by someone else".to_string(),
            ));
        }
        if transition.kind == EventKind::Rated {
            queries::refresh_provider_rating(&tx, &current.provider_id)?;
        }
        let event = queries::insert_event(
            &tx,
            &transition.booking,
            transition.kind,
            &session.user_id,
        )?;
        tx.commit()?;

        (transition.booking, event)
    };

    tracing::info!(
        booking_id = %booking.id,
        actor = %session.user_id,
        role = session.role.as_str(),
        action,
        status = booking.status.as_str(),
        payment_status = booking.payment_status.as_str(),
        version = booking.version,
        "booking updated"
    );
    events::publish(state, event);

    Ok(booking)
}

pub fn get_booking(
    state: &AppState,
    session: &Session,
    booking_id: &str,
) -> Result<Booking, AppError> {
    let db = state.db()?;
    queries::get_booking_by_id(&db, booking_id)?
        .filter(|b| can_view(b, session))
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))
}

pub fn booking_history(
    state: &AppState,
    session: &Session,
    booking_id: &str,
) -> Result<Vec<BookingEvent>, AppError> {
    let db = state.db()?;
    let visible =
        queries::get_booking_by_id(&db, booking_id)?.is_some_and(|b| can_view(&b, session));
    if !visible {
        return Err(AppError::NotFound("booking not found".to_string()));
    }
    Ok(queries::get_booking_events(&db, booking_id)?)
}

fn can_view(booking: &Booking, session: &Session) -> bool {
    session.role == Role::Admin || booking.involves(&session.user_id)
}
