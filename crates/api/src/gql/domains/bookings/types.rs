use async_graphql::{Enum, InputObject, SimpleObject, ID};
use chrono::{DateTime, Utc};

use crate::booking::TicketedBooking;
use infra::models::{AdminBookingRow, BookedSlotRow, BookingRow};

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
#[graphql(remote = "infra::repos::BookingStatus")]
pub enum BookingStatus {
    /// Awaiting payment; holds the slot until it expires
    Pending,
    /// Paid, or blocked by the venue
    Confirmed,
    /// Player showed up
    Present,
    /// Player did not show up
    Absent,
    Canceled,
    /// Player asked for a refund; the venue owner decides
    RefundRequested,
    /// Refund is being sent to the gateway
    RefundPending,
    Refunded,
    RefundRejected,
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
#[graphql(remote = "crate::booking::AttendanceAction")]
pub enum AttendanceAction {
    Present,
    Absent,
    Cancel,
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
#[graphql(remote = "crate::booking::RefundDecision")]
pub enum RefundDecision {
    Approve,
    Reject,
}

#[derive(SimpleObject, Clone)]
pub struct Booking {
    pub id: ID,
    pub user_id: ID,
    pub venue_id: ID,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Formatted as `major.minor`
    pub total_price: String,
    pub total_price_minor: i64,
    pub status: BookingStatus,
    pub order_reference: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Self {
            id: ID::from(row.id.to_string()),
            user_id: ID::from(row.user_id.to_string()),
            venue_id: ID::from(row.venue_id.to_string()),
            start_time: row.start_time,
            end_time: row.end_time,
            total_price: row.total_price.to_string(),
            total_price_minor: row.total_price.minor(),
            status: row.status.into(),
            order_reference: row.order_reference,
            payment_reference: row.payment_reference,
            created_at: row.created_at,
        }
    }
}

#[derive(SimpleObject, Clone)]
pub struct MyBooking {
    pub booking: Booking,
    /// Signed token presented at the venue; absent until the booking is paid
    pub ticket_token: Option<String>,
}

impl From<TicketedBooking> for MyBooking {
    fn from(value: TicketedBooking) -> Self {
        Self {
            booking: value.booking.into(),
            ticket_token: value.ticket,
        }
    }
}

#[derive(SimpleObject, Clone)]
pub struct AdminBooking {
    pub booking: Booking,
    pub venue_name: String,
    pub user_first_name: Option<String>,
    pub user_last_name: Option<String>,
}

impl From<AdminBookingRow> for AdminBooking {
    fn from(row: AdminBookingRow) -> Self {
        Self {
            booking: row.booking.into(),
            venue_name: row.venue_name,
            user_first_name: row.user_first_name,
            user_last_name: row.user_last_name,
        }
    }
}

#[derive(SimpleObject, Clone, Copy)]
pub struct BookedSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<BookedSlotRow> for BookedSlot {
    fn from(row: BookedSlotRow) -> Self {
        Self {
            start_time: row.start_time,
            end_time: row.end_time,
        }
    }
}

#[derive(InputObject)]
pub struct CreateBookingInput {
    pub venue_id: ID,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(InputObject)]
pub struct ManageAttendanceInput {
    pub booking_id: ID,
    pub action: AttendanceAction,
}

#[derive(InputObject)]
pub struct DecideRefundInput {
    pub booking_id: ID,
    pub decision: RefundDecision,
}
