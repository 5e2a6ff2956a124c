use serde::Serialize;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, PaymentMethod, PaymentStatus};

#[derive(Debug, Clone, Serialize)]
pub struct PaymentLink {
    pub uri: String,
    pub amount: i64,
    pub currency: &'static str,
    pub payee: String,
}

/// Builds a `upi://pay` deep link for a QR code or a payment app.
pub fn upi_link(payee: &str, payee_name: &str, amount: i64) -> String {
    format!(
        "upi://pay?pa={}&pn={}&am={amount}&cu=INR",
        encode_component(payee),
        encode_component(payee_name)
    )
}

/// The link a customer pays through. Only an online booking that is done
/// and not yet paid has one.
pub fn payment_link(config: &AppConfig, booking: &Booking) -> Result<PaymentLink, AppError> {
    if booking.payment_method != PaymentMethod::Online {
        return Err(AppError::Conflict("booking is paid in cash".to_string()));
    }
    if booking.status != BookingStatus::Completed {
        return Err(AppError::Conflict(format!(
            "booking is {}, not completed",
            booking.status.as_str()
        )));
    }
    if booking.payment_status == PaymentStatus::Paid {
        return Err(AppError::Conflict("booking is already paid".to_string()));
    }
    let amount = booking
        .price
        .ok_or_else(|| AppError::Conflict("booking has no price".to_string()))?;
    if config.upi_payee.is_empty() {
        return Err(AppError::Internal(anyhow::anyhow!("UPI_PAYEE is not configured")));
    }

    Ok(PaymentLink {
        uri: upi_link(&config.upi_payee, &config.upi_payee_name, amount),
        amount,
        currency: "INR",
        payee: config.upi_payee.clone(),
    })
}

fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'@' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
