pub mod engine;
pub mod error;
pub mod policy;
pub mod ticket;

pub use engine::{
    AttendanceAction, BookingEngine, BookingPolicy, BookingRequest, PaymentOrder, RefundDecision,
    TicketedBooking,
};
pub use error::{BookingError, BookingResult, ErrorKind};
pub use policy::{authorize, authorize_admin, Action, Actor, Role};
pub use ticket::TicketSigner;
