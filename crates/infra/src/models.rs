use crate::money::Money;
use crate::repos::bookings::BookingStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BookingRow {
    pub id: i64,
    pub user_id: i64,
    pub venue_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_price: Money,
    pub status: BookingStatus,
    pub order_reference: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BookingRow {
    /// Strict `[start, end)` overlap with another interval.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time > start
    }

    /// Stored payment reference, treating an empty string as absent.
    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference
            .as_deref()
            .filter(|reference| !reference.trim().is_empty())
    }
}

/// Booking joined with the names an admin needs to read it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AdminBookingRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub booking: BookingRow,
    pub venue_name: String,
    pub user_first_name: Option<String>,
    pub user_last_name: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VenueRow {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub address: String,
    pub price_per_hour: Money,
    pub status: String,
}

impl VenueRow {
    /// Only approved venues accept public bookings.
    pub fn is_bookable(&self) -> bool {
        self.status == "approved"
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserContactRow {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BookedSlotRow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: i64,
    pub message: String,
    pub severity: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
