pub mod bookings;
pub mod notifications;
pub mod users;
pub mod venues;

pub use bookings::{BookingRepo, BookingStatus};
pub use notifications::NotificationRepo;
pub use users::PgDirectory;
