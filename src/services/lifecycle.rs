//! Booking lifecycle and payment confirmation rules.
//!
//! Every write to a booking goes through [`apply`], which checks the command
//! against the transition table and the actor's relationship to the booking,
//! and returns the next row plus the kind of event it produces. Nothing here
//! touches the database; the caller persists the result with a version check.

use chrono::NaiveDateTime;

use crate::models::{Booking, BookingStatus, EventKind, PaymentMethod, PaymentStatus, Role};

pub const CASH_SOURCE: &str = "Cash";
pub const DEFAULT_ONLINE_SOURCE: &str = "UPI (Scan)";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Accept {
        price: Option<i64>,
    },
    Decline,
    Start,
    Complete {
        price: Option<i64>,
        cash_collected: bool,
    },
    Cancel,
    ClaimPayment {
        source: Option<String>,
    },
    ConfirmPayment,
    RejectPayment,
    Rate {
        rating: u8,
        review_text: Option<String>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Accept { .. } => "accept",
            Command::Decline => "decline",
            Command::Start => "start",
            Command::Complete { .. } => "complete",
            Command::Cancel => "cancel",
            Command::ClaimPayment { .. } => "claim payment for",
            Command::ConfirmPayment => "confirm payment for",
            Command::RejectPayment => "reject payment for",
            Command::Rate { .. } => "rate",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Actor<'a> {
    pub id: &'a str,
    pub role: Role,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LifecycleError {
    #[error("only the {0} on this booking may do that")]
    NotParticipant(&'static str),

    #[error("cannot {action} a booking that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: &'static str,
    },

    #[error("cannot {action} a booking whose payment is {payment_status}")]
    InvalidPayment {
        action: &'static str,
        payment_status: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub booking: Booking,
    pub kind: EventKind,
}

pub fn apply(
    current: &Booking,
    actor: Actor<'_>,
    command: Command,
    now: NaiveDateTime,
) -> Result<Transition, LifecycleError> {
    let action = command.name();
    let mut next = current.clone();

    let kind = match command {
        Command::Accept { price } => {
            require_provider(current, actor)?;
            require_status(current, action, &[BookingStatus::Requested])?;
            if let Some(price) = price {
                next.price = Some(validate_price(price)?);
            }
            next.status = BookingStatus::Accepted;
            EventKind::StatusChanged
        }
        Command::Decline => {
            require_provider(current, actor)?;
            require_status(current, action, &[BookingStatus::Requested])?;
            next.status = BookingStatus::Rejected;
            EventKind::StatusChanged
        }
        Command::Start => {
            require_provider(current, actor)?;
            require_status(current, action, &[BookingStatus::Accepted])?;
            next.status = BookingStatus::InProgress;
            EventKind::StatusChanged
        }
        Command::Complete {
            price,
            cash_collected,
        } => {
            require_provider(current, actor)?;
            require_status(current, action, &[BookingStatus::InProgress])?;

            let price = match price.or(current.price) {
                Some(p) => validate_price(p)?,
                None => {
                    return Err(LifecycleError::Invalid(
                        "a price is required to complete a booking".to_string(),
                    ))
                }
            };
            if cash_collected && current.payment_method != PaymentMethod::Cash {
                return Err(LifecycleError::Invalid(
                    "cash can only be collected on cash bookings".to_string(),
                ));
            }

            next.price = Some(price);
            next.status = BookingStatus::Completed;
            if cash_collected {
                mark_paid(&mut next, CASH_SOURCE);
            }
            EventKind::StatusChanged
        }
        Command::Cancel => {
            let allowed: &[BookingStatus] = match actor.role {
                Role::Admin => &[
                    BookingStatus::Requested,
                    BookingStatus::Accepted,
                    BookingStatus::InProgress,
                ],
                _ => {
                    require_customer(current, actor)?;
                    &[BookingStatus::Requested, BookingStatus::Accepted]
                }
            };
            require_status(current, action, allowed)?;
            next.status = BookingStatus::Cancelled;
            EventKind::StatusChanged
        }
        Command::ClaimPayment { source } => {
            require_customer(current, actor)?;
            require_status(current, action, &[BookingStatus::Completed])?;
            if current.payment_method != PaymentMethod::Online {
                return Err(LifecycleError::Invalid(
                    "cash payments are confirmed by the provider".to_string(),
                ));
            }
            require_payment(current, action, &[PaymentStatus::Pending])?;

            next.payment_status = PaymentStatus::Verifying;
            next.payment_source = Some(
                source
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_ONLINE_SOURCE.to_string()),
            );
            EventKind::PaymentChanged
        }
        Command::ConfirmPayment => {
            require_provider(current, actor)?;
            require_status(current, action, &[BookingStatus::Completed])?;
            match (current.payment_method, current.payment_status) {
                (PaymentMethod::Online, PaymentStatus::Verifying) => {
                    let source = current
                        .payment_source
                        .clone()
                        .unwrap_or_else(|| DEFAULT_ONLINE_SOURCE.to_string());
                    mark_paid(&mut next, &source);
                }
                (PaymentMethod::Cash, PaymentStatus::Pending) => {
                    mark_paid(&mut next, CASH_SOURCE);
                }
                (_, status) => {
                    return Err(LifecycleError::InvalidPayment {
                        action,
                        payment_status: status.as_str(),
                    })
                }
            }
            EventKind::PaymentChanged
        }
        Command::RejectPayment => {
            require_provider(current, actor)?;
            require_payment(current, action, &[PaymentStatus::Verifying])?;
            next.payment_status = PaymentStatus::Pending;
            next.payment_source = None;
            EventKind::PaymentChanged
        }
        Command::Rate {
            rating,
            review_text,
        } => {
            require_customer(current, actor)?;
            require_status(current, action, &[BookingStatus::Completed])?;
            require_payment(current, action, &[PaymentStatus::Paid])?;
            if !(1..=5).contains(&rating) {
                return Err(LifecycleError::Invalid(
                    "rating must be between 1 and 5".to_string(),
                ));
            }
            next.rating = Some(rating);
            next.review_text = review_text
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            EventKind::Rated
        }
    };

    next.version = current.version + 1;
    next.updated_at = now;

    if let Some(violation) = next.invariant_violation() {
        // The table above should make this unreachable.
        return Err(LifecycleError::Invalid(violation.to_string()));
    }

    Ok(Transition {
        booking: next,
        kind,
    })
}

pub fn new_transaction_id() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TXN-{}", &raw[..12])
}

fn mark_paid(booking: &mut Booking, source: &str) {
    booking.payment_status = PaymentStatus::Paid;
    booking.payment_source = Some(source.to_string());
    booking.transaction_id = Some(new_transaction_id());
}

fn validate_price(price: i64) -> Result<i64, LifecycleError> {
    if price <= 0 {
        return Err(LifecycleError::Invalid("price must be positive".to_string()));
    }
    Ok(price)
}

fn require_provider(booking: &Booking, actor: Actor<'_>) -> Result<(), LifecycleError> {
    if actor.role == Role::Provider && actor.id == booking.provider_id {
        Ok(())
    } else {
        Err(LifecycleError::NotParticipant("provider"))
    }
}

fn require_customer(booking: &Booking, actor: Actor<'_>) -> Result<(), LifecycleError> {
    if actor.role == Role::Customer && actor.id == booking.customer_id {
        Ok(())
    } else {
        Err(LifecycleError::NotParticipant("customer"))
    }
}

fn require_status(
    booking: &Booking,
    action: &'static str,
    allowed: &[BookingStatus],
) -> Result<(), LifecycleError> {
    if allowed.contains(&booking.status) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition {
            action,
            status: booking.status.as_str(),
        })
    }
}

fn require_payment(
    booking: &Booking,
    action: &'static str,
    allowed: &[PaymentStatus],
) -> Result<(), LifecycleError> {
    if allowed.contains(&booking.payment_status) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidPayment {
            action,
            payment_status: booking.payment_status.as_str(),
        })
    }
}
