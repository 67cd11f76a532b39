use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;

use crate::db::Db;
use crate::models::{AdminBookingRow, BookedSlotRow, BookingRow};
use crate::store::{BookingStore, ConfirmOutcome, Guard, NewBooking, StoreError, StoreResult};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, serde::Serialize, serde::Deserialize,
)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Present,
    Absent,
    Canceled,
    RefundRequested,
    /// Claimed for a gateway refund that has not completed yet.
    RefundPending,
    Refunded,
    RefundRejected,
}

impl BookingStatus {
    /// Statuses that hold the time slot and block new bookings.
    pub const OCCUPYING: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Present,
        BookingStatus::RefundRequested,
        BookingStatus::RefundPending,
        BookingStatus::RefundRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Present => "present",
            BookingStatus::Absent => "absent",
            BookingStatus::Canceled => "canceled",
            BookingStatus::RefundRequested => "refund_requested",
            BookingStatus::RefundPending => "refund_pending",
            BookingStatus::Refunded => "refunded",
            BookingStatus::RefundRejected => "refund_rejected",
        }
    }

    pub fn is_occupying(&self) -> bool {
        Self::OCCUPYING.contains(self)
    }

    /// Bookings whose ticket admits entry to the venue.
    pub fn admits_entry(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Present)
    }

    /// Legal edges of the booking state machine.
    ///
    /// Refunds pass through `RefundPending` so only one caller reaches the
    /// gateway; a failed refund returns the booking to where it was claimed.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Canceled)
                | (Confirmed, Present)
                | (Confirmed, Absent)
                | (Confirmed, RefundRequested)
                | (Confirmed, RefundPending)
                | (Confirmed, Canceled)
                | (RefundRequested, RefundPending)
                | (RefundRequested, RefundRejected)
                | (RefundPending, Refunded)
                | (RefundPending, Confirmed)
                | (RefundPending, RefundRequested)
        )
    }

    /// Subset of `from` that may legally move to `to`.
    pub fn legal_sources(from: &[BookingStatus], to: BookingStatus) -> Vec<BookingStatus> {
        from.iter()
            .copied()
            .filter(|status| status.can_transition_to(to))
            .collect()
    }
}

pub async fn get_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
) -> sqlx::Result<Option<BookingRow>> {
    sqlx::query_as::<_, BookingRow>(
        r#"
        SELECT id, user_id, venue_id, start_time, end_time, total_price, status, order_reference, payment_reference, created_at
        FROM bookings
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn count_overlapping<'e>(
    executor: impl PgExecutor<'e>,
    venue_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM bookings
        WHERE venue_id = $1
          AND status = ANY($2)
          AND start_time < $4
          AND end_time > $3
        "#,
    )
    .bind(venue_id)
    .bind(BookingStatus::OCCUPYING.to_vec())
    .bind(start)
    .bind(end)
    .fetch_one(executor)
    .await
}

pub async fn insert<'e>(
    executor: impl PgExecutor<'e>,
    data: &NewBooking,
) -> sqlx::Result<BookingRow> {
    sqlx::query_as::<_, BookingRow>(
        r#"
        INSERT INTO bookings (user_id, venue_id, start_time, end_time, total_price, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, venue_id, start_time, end_time, total_price, status, order_reference, payment_reference, created_at
        "#,
    )
    .bind(data.user_id)
    .bind(data.venue_id)
    .bind(data.start_time)
    .bind(data.end_time)
    .bind(data.total_price)
    .bind(data.status)
    .fetch_one(executor)
    .await
}

pub async fn update_status<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    from: &[BookingStatus],
    to: BookingStatus,
    guard: Guard,
) -> sqlx::Result<Option<BookingRow>> {
    let from = BookingStatus::legal_sources(from, to);
    if from.is_empty() {
        return Ok(None);
    }

    match guard {
        Guard::Any => {
            sqlx::query_as::<_, BookingRow>(
                r#"
                UPDATE bookings SET status = $2
                WHERE id = $1 AND status = ANY($3)
                RETURNING id, user_id, venue_id, start_time, end_time, total_price, status, order_reference, payment_reference, created_at
                "#,
            )
            .bind(id)
            .bind(to)
            .bind(from)
            .fetch_optional(executor)
            .await
        }
        Guard::Owner(user_id) => {
            sqlx::query_as::<_, BookingRow>(
                r#"
                UPDATE bookings SET status = $2
                WHERE id = $1 AND status = ANY($3) AND user_id = $4
                RETURNING id, user_id, venue_id, start_time, end_time, total_price, status, order_reference, payment_reference, created_at
                "#,
            )
            .bind(id)
            .bind(to)
            .bind(from)
            .bind(user_id)
            .fetch_optional(executor)
            .await
        }
        Guard::VenueOwner(owner_id) => {
            // Join through venues so the ownership check and the write are one statement.
            sqlx::query_as::<_, BookingRow>(
                r#"
                UPDATE bookings b SET status = $2
                FROM venues v
                WHERE b.id = $1 AND b.status = ANY($3) AND v.id = b.venue_id AND v.owner_id = $4
                RETURNING b.id, b.user_id, b.venue_id, b.start_time, b.end_time, b.total_price, b.status, b.order_reference, b.payment_reference, b.created_at
                "#,
            )
            .bind(id)
            .bind(to)
            .bind(from)
            .bind(owner_id)
            .fetch_optional(executor)
            .await
        }
    }
}

pub async fn set_order_reference<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    order_reference: &str,
) -> sqlx::Result<Option<BookingRow>> {
    sqlx::query_as::<_, BookingRow>(
        r#"
        UPDATE bookings SET order_reference = $2
        WHERE id = $1 AND status = 'pending'
        RETURNING id, user_id, venue_id, start_time, end_time, total_price, status, order_reference, payment_reference, created_at
        "#,
    )
    .bind(id)
    .bind(order_reference)
    .fetch_optional(executor)
    .await
}

pub async fn mark_confirmed<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
    order_reference: &str,
    payment_reference: &str,
) -> sqlx::Result<Option<BookingRow>> {
    sqlx::query_as::<_, BookingRow>(
        r#"
        UPDATE bookings SET status = 'confirmed', payment_reference = $3
        WHERE id = $1 AND status = 'pending' AND order_reference = $2
        RETURNING id, user_id, venue_id, start_time, end_time, total_price, status, order_reference, payment_reference, created_at
        "#,
    )
    .bind(id)
    .bind(order_reference)
    .bind(payment_reference)
    .fetch_optional(executor)
    .await
}

pub async fn cancel_pending_created_before<'e>(
    executor: impl PgExecutor<'e>,
    created_before: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "UPDATE bookings SET status = 'canceled' WHERE status = 'pending' AND created_at < $1",
    )
    .bind(created_before)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_canceled_created_before<'e>(
    executor: impl PgExecutor<'e>,
    created_before: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let result =
        sqlx::query("DELETE FROM bookings WHERE status = 'canceled' AND created_at < $1")
            .bind(created_before)
            .execute(executor)
            .await?;

    Ok(result.rows_affected())
}

pub async fn list_by_user<'e>(
    executor: impl PgExecutor<'e>,
    user_id: i64,
) -> sqlx::Result<Vec<BookingRow>> {
    sqlx::query_as::<_, BookingRow>(
        r#"
        SELECT id, user_id, venue_id, start_time, end_time, total_price, status, order_reference, payment_reference, created_at
        FROM bookings
        WHERE user_id = $1
        ORDER BY start_time DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn list_by_venue<'e>(
    executor: impl PgExecutor<'e>,
    venue_id: i64,
) -> sqlx::Result<Vec<BookingRow>> {
    sqlx::query_as::<_, BookingRow>(
        r#"
        SELECT id, user_id, venue_id, start_time, end_time, total_price, status, order_reference, payment_reference, created_at
        FROM bookings
        WHERE venue_id = $1
        ORDER BY start_time DESC
        "#,
    )
    .bind(venue_id)
    .fetch_all(executor)
    .await
}

pub async fn list_all<'e>(executor: impl PgExecutor<'e>) -> sqlx::Result<Vec<AdminBookingRow>> {
    sqlx::query_as::<_, AdminBookingRow>(
        r#"
        SELECT b.id, b.user_id, b.venue_id, b.start_time, b.end_time, b.total_price, b.status,
               b.order_reference, b.payment_reference, b.created_at,
               v.name AS venue_name, u.first_name AS user_first_name, u.last_name AS user_last_name
        FROM bookings b
        JOIN venues v ON v.id = b.venue_id
        LEFT JOIN users u ON u.id = b.user_id
        ORDER BY b.created_at DESC
        "#,
    )
    .fetch_all(executor)
    .await
}

pub async fn list_occupied_slots<'e>(
    executor: impl PgExecutor<'e>,
    venue_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> sqlx::Result<Vec<BookedSlotRow>> {
    sqlx::query_as::<_, BookedSlotRow>(
        r#"
        SELECT start_time, end_time
        FROM bookings
        WHERE venue_id = $1
          AND status = ANY($2)
          AND start_time >= $3
          AND start_time < $4
        ORDER BY start_time ASC
        "#,
    )
    .bind(venue_id)
    .bind(BookingStatus::OCCUPYING.to_vec())
    .bind(from)
    .bind(to)
    .fetch_all(executor)
    .await
}

/// Map constraint violations: an exclusion hit means a concurrent insert
/// won the slot, a unique hit means the payment already confirmed a booking.
fn classify(err: sqlx::Error) -> StoreError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());

    match code.as_deref() {
        Some("23P01") => StoreError::SlotTaken,
        Some("23505") => StoreError::PaymentReused,
        _ => StoreError::Db(err),
    }
}

/// Postgres-backed [`BookingStore`].
#[derive(Debug, Clone)]
pub struct BookingRepo {
    db: Db,
}

impl BookingRepo {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BookingStore for BookingRepo {
    async fn count_overlapping(
        &self,
        venue_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<i64> {
        Ok(count_overlapping(&self.db, venue_id, start, end).await?)
    }

    async fn insert_checked(&self, booking: NewBooking) -> StoreResult<BookingRow> {
        let mut tx = self.db.begin().await?;

        // Serialize writers per venue; the exclusion constraint still has the final word.
        let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM venues WHERE id = $1 FOR UPDATE")
            .bind(booking.venue_id)
            .fetch_optional(&mut *tx)
            .await?;

        if locked.is_none() {
            return Err(StoreError::VenueMissing(booking.venue_id));
        }

        let overlapping =
            count_overlapping(&mut *tx, booking.venue_id, booking.start_time, booking.end_time)
                .await?;
        if overlapping > 0 {
            return Err(StoreError::SlotTaken);
        }

        let row = insert(&mut *tx, &booking).await.map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        Ok(row)
    }

    async fn find(&self, booking_id: i64) -> StoreResult<Option<BookingRow>> {
        Ok(get_by_id(&self.db, booking_id).await?)
    }

    async fn transition(
        &self,
        booking_id: i64,
        from: &[BookingStatus],
        to: BookingStatus,
        guard: Guard,
    ) -> StoreResult<Option<BookingRow>> {
        Ok(update_status(&self.db, booking_id, from, to, guard).await?)
    }

    async fn attach_order(
        &self,
        booking_id: i64,
        order_reference: &str,
    ) -> StoreResult<Option<BookingRow>> {
        Ok(set_order_reference(&self.db, booking_id, order_reference).await?)
    }

    async fn confirm_payment(
        &self,
        booking_id: i64,
        order_reference: &str,
        payment_reference: &str,
    ) -> StoreResult<ConfirmOutcome> {
        let confirmed = mark_confirmed(&self.db, booking_id, order_reference, payment_reference)
            .await
            .map_err(classify)?;
        if let Some(row) = confirmed {
            return Ok(ConfirmOutcome::Confirmed(row));
        }

        let current = get_by_id(&self.db, booking_id).await?;
        Ok(ConfirmOutcome::resolve(current, payment_reference))
    }

    async fn expire_pending(&self, created_before: DateTime<Utc>) -> StoreResult<u64> {
        Ok(cancel_pending_created_before(&self.db, created_before).await?)
    }

    async fn purge_canceled(&self, created_before: DateTime<Utc>) -> StoreResult<u64> {
        Ok(delete_canceled_created_before(&self.db, created_before).await?)
    }

    async fn list_by_user(&self, user_id: i64) -> StoreResult<Vec<BookingRow>> {
        Ok(list_by_user(&self.db, user_id).await?)
    }

    async fn list_by_venue(&self, venue_id: i64) -> StoreResult<Vec<BookingRow>> {
        Ok(list_by_venue(&self.db, venue_id).await?)
    }

    async fn list_all(&self) -> StoreResult<Vec<AdminBookingRow>> {
        Ok(list_all(&self.db).await?)
    }

    async fn booked_slots(
        &self,
        venue_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<BookedSlotRow>> {
        Ok(list_occupied_slots(&self.db, venue_id, from, to).await?)
    }
}
