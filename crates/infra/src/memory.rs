//! In-process backend used by tests and local demos.
//!
//! Every operation runs under one lock, so check-then-insert is atomic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::models::{AdminBookingRow, BookedSlotRow, BookingRow, UserContactRow, VenueRow};
use crate::repos::bookings::BookingStatus;
use crate::store::{
    BookingStore, ConfirmOutcome, Directory, Guard, NewBooking, StoreError, StoreResult,
};

#[derive(Default)]
struct State {
    next_id: i64,
    bookings: BTreeMap<i64, BookingRow>,
    venues: HashMap<i64, VenueRow>,
    contacts: HashMap<i64, UserContactRow>,
}

impl State {
    fn overlapping(&self, venue_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        self.bookings
            .values()
            .filter(|b| b.venue_id == venue_id && b.status.is_occupying() && b.overlaps(start, end))
            .count() as i64
    }

    fn guard_holds(&self, booking: &BookingRow, guard: Guard) -> bool {
        match guard {
            Guard::Any => true,
            Guard::Owner(user_id) => booking.user_id == user_id,
            Guard::VenueOwner(owner_id) => self
                .venues
                .get(&booking.venue_id)
                .is_some_and(|v| v.owner_id == owner_id),
        }
    }
}

#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_venue(&self, venue: VenueRow) {
        self.state.lock().venues.insert(venue.id, venue);
    }

    pub fn add_contact(&self, contact: UserContactRow) {
        self.state.lock().contacts.insert(contact.id, contact);
    }

    /// Backdate a booking, e.g. to make it eligible for expiry.
    pub fn set_created_at(&self, booking_id: i64, created_at: DateTime<Utc>) -> bool {
        match self.state.lock().bookings.get_mut(&booking_id) {
            Some(row) => {
                row.created_at = created_at;
                true
            }
            None => false,
        }
    }

    pub fn set_payment_reference(&self, booking_id: i64, reference: Option<String>) -> bool {
        match self.state.lock().bookings.get_mut(&booking_id) {
            Some(row) => {
                row.payment_reference = reference;
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<BookingRow> {
        self.state.lock().bookings.values().cloned().collect()
    }
}

#[async_trait]
impl BookingStore for InMemoryBackend {
    async fn count_overlapping(
        &self,
        venue_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<i64> {
        Ok(self.state.lock().overlapping(venue_id, start, end))
    }

    async fn insert_checked(&self, booking: NewBooking) -> StoreResult<BookingRow> {
        let mut state = self.state.lock();

        if !state.venues.contains_key(&booking.venue_id) {
            return Err(StoreError::VenueMissing(booking.venue_id));
        }
        if state.overlapping(booking.venue_id, booking.start_time, booking.end_time) > 0 {
            return Err(StoreError::SlotTaken);
        }

        state.next_id += 1;
        let row = BookingRow {
            id: state.next_id,
            user_id: booking.user_id,
            venue_id: booking.venue_id,
            start_time: booking.start_time,
            end_time: booking.end_time,
            total_price: booking.total_price,
            status: booking.status,
            order_reference: None,
            payment_reference: None,
            created_at: Utc::now(),
        };
        state.bookings.insert(row.id, row.clone());

        Ok(row)
    }

    async fn find(&self, booking_id: i64) -> StoreResult<Option<BookingRow>> {
        Ok(self.state.lock().bookings.get(&booking_id).cloned())
    }

    async fn transition(
        &self,
        booking_id: i64,
        from: &[BookingStatus],
        to: BookingStatus,
        guard: Guard,
    ) -> StoreResult<Option<BookingRow>> {
        let mut state = self.state.lock();

        let eligible = state
            .bookings
            .get(&booking_id)
            .is_some_and(|b| {
                from.contains(&b.status)
                    && b.status.can_transition_to(to)
                    && state.guard_holds(b, guard)
            });
        if !eligible {
            return Ok(None);
        }

        Ok(state.bookings.get_mut(&booking_id).map(|row| {
            row.status = to;
            row.clone()
        }))
    }

    async fn attach_order(
        &self,
        booking_id: i64,
        order_reference: &str,
    ) -> StoreResult<Option<BookingRow>> {
        let mut state = self.state.lock();

        Ok(state
            .bookings
            .get_mut(&booking_id)
            .filter(|row| row.status == BookingStatus::Pending)
            .map(|row| {
                row.order_reference = Some(order_reference.to_string());
                row.clone()
            }))
    }

    async fn confirm_payment(
        &self,
        booking_id: i64,
        order_reference: &str,
        payment_reference: &str,
    ) -> StoreResult<ConfirmOutcome> {
        let mut state = self.state.lock();

        let reused = state.bookings.values().any(|b| {
            b.id != booking_id && b.payment_reference.as_deref() == Some(payment_reference)
        });

        match state.bookings.get_mut(&booking_id) {
            Some(row)
                if row.status == BookingStatus::Pending
                    && row.order_reference.as_deref() == Some(order_reference) =>
            {
                if reused {
                    return Err(StoreError::PaymentReused);
                }
                row.status = BookingStatus::Confirmed;
                row.payment_reference = Some(payment_reference.to_string());
                Ok(ConfirmOutcome::Confirmed(row.clone()))
            }
            other => Ok(ConfirmOutcome::resolve(other.cloned(), payment_reference)),
        }
    }

    async fn expire_pending(&self, created_before: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let mut expired = 0;

        for row in state.bookings.values_mut() {
            if row.status == BookingStatus::Pending && row.created_at < created_before {
                row.status = BookingStatus::Canceled;
                expired += 1;
            }
        }

        Ok(expired)
    }

    async fn purge_canceled(&self, created_before: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let before = state.bookings.len();

        state
            .bookings
            .retain(|_, row| !(row.status == BookingStatus::Canceled && row.created_at < created_before));

        Ok((before - state.bookings.len()) as u64)
    }

    async fn list_by_user(&self, user_id: i64) -> StoreResult<Vec<BookingRow>> {
        let mut rows: Vec<_> = self
            .state
            .lock()
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(rows)
    }

    async fn list_by_venue(&self, venue_id: i64) -> StoreResult<Vec<BookingRow>> {
        let mut rows: Vec<_> = self
            .state
            .lock()
            .bookings
            .values()
            .filter(|b| b.venue_id == venue_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(rows)
    }

    async fn list_all(&self) -> StoreResult<Vec<AdminBookingRow>> {
        let state = self.state.lock();

        let mut rows: Vec<_> = state
            .bookings
            .values()
            .filter_map(|b| {
                let venue = state.venues.get(&b.venue_id)?;
                let contact = state.contacts.get(&b.user_id);
                Some(AdminBookingRow {
                    booking: b.clone(),
                    venue_name: venue.name.clone(),
                    user_first_name: contact.map(|c| c.first_name.clone()),
                    user_last_name: contact.and_then(|c| c.last_name.clone()),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.booking.created_at.cmp(&a.booking.created_at));
        Ok(rows)
    }

    async fn booked_slots(
        &self,
        venue_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<BookedSlotRow>> {
        let mut slots: Vec<_> = self
            .state
            .lock()
            .bookings
            .values()
            .filter(|b| {
                b.venue_id == venue_id
                    && b.status.is_occupying()
                    && b.start_time >= from
                    && b.start_time < to
            })
            .map(|b| BookedSlotRow {
                start_time: b.start_time,
                end_time: b.end_time,
            })
            .collect();
        slots.sort_by_key(|s| s.start_time);
        Ok(slots)
    }
}

#[async_trait]
impl Directory for InMemoryBackend {
    async fn venue(&self, venue_id: i64) -> StoreResult<Option<VenueRow>> {
        Ok(self.state.lock().venues.get(&venue_id).cloned())
    }

    async fn contact(&self, user_id: i64) -> StoreResult<Option<UserContactRow>> {
        Ok(self.state.lock().contacts.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use chrono::{Duration, TimeZone};

    fn venue(id: i64, owner_id: i64) -> VenueRow {
        VenueRow {
            id,
            owner_id,
            name: format!("Court {id}"),
            address: "1 Main St".into(),
            price_per_hour: Money::from_major(500),
            status: "approved".into(),
        }
    }

    fn new_booking(venue_id: i64, start_hour: u32, hours: i64) -> NewBooking {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, start_hour, 0, 0).unwrap();
        NewBooking {
            user_id: 7,
            venue_id,
            start_time: start,
            end_time: start + Duration::hours(hours),
            total_price: Money::from_major(500 * hours),
            status: BookingStatus::Pending,
        }
    }

    #[tokio::test]
    async fn rejects_overlap_but_allows_touching_intervals() {
        let backend = InMemoryBackend::new();
        backend.add_venue(venue(1, 99));

        backend.insert_checked(new_booking(1, 10, 2)).await.unwrap();

        let clash = backend.insert_checked(new_booking(1, 11, 2)).await;
        assert!(matches!(clash, Err(StoreError::SlotTaken)));

        backend.insert_checked(new_booking(1, 12, 1)).await.unwrap();
        backend.insert_checked(new_booking(1, 8, 2)).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_venue_is_reported() {
        let backend = InMemoryBackend::new();
        let res = backend.insert_checked(new_booking(5, 10, 1)).await;
        assert!(matches!(res, Err(StoreError::VenueMissing(5))));
    }

    #[tokio::test]
    async fn venue_owner_guard_checks_venue() {
        let backend = InMemoryBackend::new();
        backend.add_venue(venue(1, 99));
        let row = backend.insert_checked(new_booking(1, 10, 1)).await.unwrap();

        let denied = backend
            .transition(row.id, &[BookingStatus::Pending], BookingStatus::Canceled, Guard::VenueOwner(98))
            .await
            .unwrap();
        assert!(denied.is_none());

        let done = backend
            .transition(row.id, &[BookingStatus::Pending], BookingStatus::Canceled, Guard::VenueOwner(99))
            .await
            .unwrap();
        assert_eq!(done.map(|r| r.status), Some(BookingStatus::Canceled));
    }

    #[tokio::test]
    async fn confirm_is_idempotent_for_same_reference() {
        let backend = InMemoryBackend::new();
        backend.add_venue(venue(1, 99));
        let row = backend.insert_checked(new_booking(1, 10, 1)).await.unwrap();
        backend.attach_order(row.id, "order_1").await.unwrap();

        let first = backend.confirm_payment(row.id, "order_1", "pay_1").await.unwrap();
        assert!(matches!(first, ConfirmOutcome::Confirmed(_)));

        let again = backend.confirm_payment(row.id, "order_1", "pay_1").await.unwrap();
        assert!(matches!(again, ConfirmOutcome::AlreadyConfirmed(_)));

        let other = backend.confirm_payment(row.id, "order_1", "pay_2").await.unwrap();
        assert!(matches!(other, ConfirmOutcome::NotPending(_)));

        let missing = backend.confirm_payment(404, "order_1", "pay_1").await.unwrap();
        assert_eq!(missing, ConfirmOutcome::Missing);

        // Orders only attach while pending.
        assert!(backend.attach_order(row.id, "order_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn payment_is_bound_to_its_order_and_booking() {
        let backend = InMemoryBackend::new();
        backend.add_venue(venue(1, 99));
        let a = backend.insert_checked(new_booking(1, 10, 1)).await.unwrap();
        let b = backend.insert_checked(new_booking(1, 12, 1)).await.unwrap();
        backend.attach_order(a.id, "order_a").await.unwrap();
        backend.attach_order(b.id, "order_b").await.unwrap();

        let unattached = backend.confirm_payment(b.id, "order_a", "pay_a").await.unwrap();
        assert!(matches!(unattached, ConfirmOutcome::OrderMismatch(_)));

        backend.confirm_payment(a.id, "order_a", "pay_a").await.unwrap();
        let reused = backend.confirm_payment(b.id, "order_b", "pay_a").await;
        assert!(matches!(reused, Err(StoreError::PaymentReused)));
    }

    #[tokio::test]
    async fn transition_refuses_illegal_edges() {
        let backend = InMemoryBackend::new();
        backend.add_venue(venue(1, 99));
        let row = backend.insert_checked(new_booking(1, 10, 1)).await.unwrap();

        let skipped = backend
            .transition(row.id, &[BookingStatus::Pending], BookingStatus::Refunded, Guard::Any)
            .await
            .unwrap();
        assert!(skipped.is_none());
        assert_eq!(backend.snapshot()[0].status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn list_all_joins_names() {
        let backend = InMemoryBackend::new();
        backend.add_venue(venue(1, 99));
        backend.add_contact(UserContactRow {
            id: 7,
            email: "p@example.com".into(),
            first_name: "Ravi".into(),
            last_name: Some("Kumar".into()),
        });
        backend.insert_checked(new_booking(1, 10, 1)).await.unwrap();

        let rows = backend.list_all().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].venue_name, "Court 1");
        assert_eq!(rows[0].user_first_name.as_deref(), Some("Ravi"));
        assert_eq!(rows[0].user_last_name.as_deref(), Some("Kumar"));
    }

    #[tokio::test]
    async fn expire_only_touches_old_pending_rows() {
        let backend = InMemoryBackend::new();
        backend.add_venue(venue(1, 99));
        let old = backend.insert_checked(new_booking(1, 8, 1)).await.unwrap();
        let fresh = backend.insert_checked(new_booking(1, 10, 1)).await.unwrap();
        let paid = backend.insert_checked(new_booking(1, 12, 1)).await.unwrap();
        backend.attach_order(paid.id, "order").await.unwrap();
        backend.confirm_payment(paid.id, "order", "pay").await.unwrap();

        let long_ago = Utc::now() - Duration::minutes(30);
        backend.set_created_at(old.id, long_ago);
        backend.set_created_at(paid.id, long_ago);

        let cutoff = Utc::now() - Duration::minutes(10);
        assert_eq!(backend.expire_pending(cutoff).await.unwrap(), 1);

        let status = |id| {
            backend
                .snapshot()
                .into_iter()
                .find(|b| b.id == id)
                .map(|b| b.status)
        };
        assert_eq!(status(old.id), Some(BookingStatus::Canceled));
        assert_eq!(status(fresh.id), Some(BookingStatus::Pending));
        assert_eq!(status(paid.id), Some(BookingStatus::Confirmed));

        assert_eq!(backend.purge_canceled(cutoff).await.unwrap(), 1);
        assert_eq!(backend.snapshot().len(), 2);
    }
}
