pub mod booking;
pub mod event;
pub mod profile;
pub mod role;

pub use booking::{Booking, BookingStatus, JobTab, PaymentMethod, PaymentStatus};
pub use event::{BookingEvent, EventKind};
pub use profile::{Profile, ProfileUpdate};
pub use role::Role;
