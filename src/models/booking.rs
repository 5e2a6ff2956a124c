use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub provider_id: String,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    pub address: String,
    pub description: Option<String>,
    pub status: BookingStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub price: Option<i64>,
    pub payment_source: Option<String>,
    pub transaction_id: Option<String>,
    pub rating: Option<u8>,
    pub review_text: Option<String>,
    pub request_id: Option<String>,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    /// Returns the first broken cross-field invariant, if any.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        let paid = self.payment_status == PaymentStatus::Paid;
        if paid && self.status != BookingStatus::Completed {
            return Some("paid booking must be completed");
        }
        if self.transaction_id.is_some() != paid {
            return Some("transaction id must be set exactly when paid");
        }
        if self.payment_status == PaymentStatus::Verifying
            && (self.status != BookingStatus::Completed
                || self.payment_method != PaymentMethod::Online)
        {
            return Some("only completed online bookings can be verifying");
        }
        if self.rating.is_some() && !paid {
            return Some("only paid bookings can be rated");
        }
        None
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.customer_id == user_id || self.provider_id == user_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::Accepted => "accepted",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(BookingStatus::Requested),
            "accepted" => Some(BookingStatus::Accepted),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "rejected" => Some(BookingStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    #[default]
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Online => "online",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "online" => Some(PaymentMethod::Online),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Verifying,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Verifying => "verifying",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "verifying" => Some(PaymentStatus::Verifying),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// The provider's job board groups bookings into three tabs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobTab {
    Requests,
    Active,
    History,
}

impl JobTab {
    pub fn statuses(&self) -> &'static [BookingStatus] {
        match self {
            JobTab::Requests => &[BookingStatus::Requested],
            JobTab::Active => &[BookingStatus::Accepted, BookingStatus::InProgress],
            JobTab::History => &[
                BookingStatus::Completed,
                BookingStatus::Cancelled,
                BookingStatus::Rejected,
            ],
        }
    }

    pub fn of(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Requested => JobTab::Requests,
            BookingStatus::Accepted | BookingStatus::InProgress => JobTab::Active,
            _ => JobTab::History,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn booking(status: BookingStatus, payment_method: PaymentMethod) -> Booking {
        let now =
            NaiveDateTime::parse_from_str("2030-01-01 09:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Booking {
            id: "bk-1".to_string(),
            customer_id: "cust-1".to_string(),
            provider_id: "prov-1".to_string(),
            booking_date: NaiveDate::from_ymd_opt(2030, 1, 2).unwrap(),
            booking_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            address: "12 Main St".to_string(),
            description: Some("Leaking tap".to_string()),
            status,
            payment_method,
            payment_status: PaymentStatus::Pending,
            price: None,
            payment_source: None,
            transaction_id: None,
            rating: None,
            review_text: None,
            request_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}
