use thiserror::Error;

use infra::repos::BookingStatus;
use infra::store::StoreError;

use crate::payment::GatewayError;

/// Stable, machine-readable error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    Forbidden,
    UpstreamFailure,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::UpstreamFailure => "UPSTREAM_FAILURE",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("end time must be after start time")]
    InvalidRange,

    #[error("cannot book a slot in the past")]
    PastSlot,

    #[error("{0}")]
    InvalidInput(String),

    #[error("time slot is already booked")]
    SlotTaken,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("cannot cancel within {cutoff_minutes} minutes of the start time")]
    TooLateToCancel { cutoff_minutes: i64 },

    #[error("booking is {}, this action is not allowed", .status.as_str())]
    InvalidState { status: BookingStatus },

    #[error("booking was modified concurrently, please retry")]
    Contended,

    #[error("booking has no payment reference to refund")]
    MissingPaymentRef,

    #[error("booking is already paid")]
    AlreadyPaid,

    #[error("booking slot has already started")]
    SlotExpired,

    #[error("payment signature verification failed")]
    InvalidSignature,

    #[error("payment was not made against this booking's order")]
    OrderMismatch,

    #[error("payment has already confirmed another booking")]
    PaymentReused,

    #[error("payment gateway error: {0}")]
    Upstream(#[from] GatewayError),

    #[error("internal error")]
    Storage(#[source] sqlx::Error),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::NotFound(_) => ErrorKind::NotFound,
            BookingError::InvalidRange | BookingError::PastSlot | BookingError::InvalidInput(_) => {
                ErrorKind::InvalidInput
            }
            BookingError::SlotTaken
            | BookingError::TooLateToCancel { .. }
            | BookingError::InvalidState { .. }
            | BookingError::Contended
            | BookingError::MissingPaymentRef
            | BookingError::AlreadyPaid
            | BookingError::PaymentReused
            | BookingError::SlotExpired => ErrorKind::Conflict,
            BookingError::Forbidden(_)
            | BookingError::InvalidSignature
            | BookingError::OrderMismatch => ErrorKind::Forbidden,
            BookingError::Upstream(_) => ErrorKind::UpstreamFailure,
            BookingError::Storage(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SlotTaken => BookingError::SlotTaken,
            StoreError::VenueMissing(_) => BookingError::NotFound("venue"),
            StoreError::PaymentReused => BookingError::PaymentReused,
            StoreError::Db(e) => BookingError::Storage(e),
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
