//! Persistence seams used by the booking engine.
//!
//! Postgres implementations live in [`crate::repos`]; [`crate::memory`]
//! provides an in-process backend with the same atomicity guarantees.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{AdminBookingRow, BookedSlotRow, BookingRow, UserContactRow, VenueRow};
use crate::money::Money;
use crate::repos::bookings::BookingStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("time slot is already booked")]
    SlotTaken,

    #[error("venue {0} not found")]
    VenueMissing(i64),

    #[error("payment already confirmed another booking")]
    PaymentReused,

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i64,
    pub venue_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_price: Money,
    pub status: BookingStatus,
}

/// Row-level ownership condition applied inside a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Any,
    /// Booking holder must match.
    Owner(i64),
    /// Owner of the booked venue must match.
    VenueOwner(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed(BookingRow),
    /// Already confirmed with the same payment reference.
    AlreadyConfirmed(BookingRow),
    NotPending(BookingRow),
    /// Still pending, but the payment was made against another order.
    OrderMismatch(BookingRow),
    Missing,
}

impl ConfirmOutcome {
    /// Classify a booking whose pending -> confirmed update did not apply.
    pub fn resolve(current: Option<BookingRow>, payment_reference: &str) -> Self {
        match current {
            None => ConfirmOutcome::Missing,
            Some(row)
                if row.status == BookingStatus::Confirmed
                    && row.payment_reference() == Some(payment_reference) =>
            {
                ConfirmOutcome::AlreadyConfirmed(row)
            }
            Some(row) if row.status == BookingStatus::Pending => ConfirmOutcome::OrderMismatch(row),
            Some(row) => ConfirmOutcome::NotPending(row),
        }
    }
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Count occupying bookings at `venue_id` overlapping `[start, end)`.
    async fn count_overlapping(
        &self,
        venue_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<i64>;

    /// Atomically check for overlaps and insert. Concurrent callers for
    /// overlapping intervals see at most one success.
    async fn insert_checked(&self, booking: NewBooking) -> StoreResult<BookingRow>;

    async fn find(&self, booking_id: i64) -> StoreResult<Option<BookingRow>>;

    /// Move the booking to `to` if its status is one of `from` and `guard`
    /// holds. Returns `None` when nothing matched.
    async fn transition(
        &self,
        booking_id: i64,
        from: &[BookingStatus],
        to: BookingStatus,
        guard: Guard,
    ) -> StoreResult<Option<BookingRow>>;

    /// Record the gateway order opened for a pending booking, replacing any
    /// earlier one. Returns `None` when the booking is not pending.
    async fn attach_order(
        &self,
        booking_id: i64,
        order_reference: &str,
    ) -> StoreResult<Option<BookingRow>>;

    /// Confirm a pending booking whose attached order matches
    /// `order_reference`. A payment reference confirms at most one booking.
    async fn confirm_payment(
        &self,
        booking_id: i64,
        order_reference: &str,
        payment_reference: &str,
    ) -> StoreResult<ConfirmOutcome>;

    /// Cancel every pending booking created before the cutoff.
    async fn expire_pending(&self, created_before: DateTime<Utc>) -> StoreResult<u64>;

    /// Delete canceled bookings created before the cutoff.
    async fn purge_canceled(&self, created_before: DateTime<Utc>) -> StoreResult<u64>;

    async fn list_by_user(&self, user_id: i64) -> StoreResult<Vec<BookingRow>>;

    async fn list_by_venue(&self, venue_id: i64) -> StoreResult<Vec<BookingRow>>;

    /// Every booking with venue and holder names, newest first.
    async fn list_all(&self) -> StoreResult<Vec<AdminBookingRow>>;

    /// Occupied slots starting within `[from, to)`.
    async fn booked_slots(
        &self,
        venue_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<BookedSlotRow>>;
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn venue(&self, venue_id: i64) -> StoreResult<Option<VenueRow>>;

    async fn contact(&self, user_id: i64) -> StoreResult<Option<UserContactRow>>;
}
