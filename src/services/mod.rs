pub mod bookings;
pub mod events;
pub mod lifecycle;
pub mod notify;
pub mod payment;
