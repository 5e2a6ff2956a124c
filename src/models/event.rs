use serde::{Deserialize, Serialize};

use super::Role;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    StatusChanged,
    PaymentChanged,
    Rated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::StatusChanged => "status_changed",
            EventKind::PaymentChanged => "payment_changed",
            EventKind::Rated => "rated",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingEvent {
    pub id: i64,
    pub booking_id: String,
    pub customer_id: String,
    pub provider_id: String,
    pub kind: String,
    pub status: String,
    pub payment_status: String,
    pub actor_id: String,
    pub created_at: String,
}

impl BookingEvent {
    pub fn visible_to(&self, user_id: &str, role: Role) -> bool {
        role == Role::Admin || self.customer_id == user_id || self.provider_id == user_id
    }
}
