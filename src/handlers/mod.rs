pub mod admin;
pub mod bookings;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod json;
pub mod profile;
pub mod providers;
