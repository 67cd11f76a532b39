use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use infra::models::{AdminBookingRow, BookedSlotRow, BookingRow, VenueRow};
use infra::repos::BookingStatus;
use infra::store::{BookingStore, ConfirmOutcome, Directory, Guard, NewBooking};
use infra::Money;

use super::error::{BookingError, BookingResult};
use super::policy::{authorize, authorize_admin, authorize_venue, guard_admits, Action, Actor};
use super::ticket::TicketSigner;
use crate::payment::{retry_transient, PaymentGateway, RetryPolicy};
use crate::services::email_service::{BookingConfirmation, Mailer};
use crate::services::notification_service::{Notifier, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingRequest {
    pub venue_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceAction {
    Present,
    Absent,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefundDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOrder {
    pub booking_id: i64,
    pub order_ref: String,
    pub amount: Money,
    pub currency: String,
    pub key_id: String,
}

/// A booking as its holder sees it; only paid bookings carry a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketedBooking {
    pub booking: BookingRow,
    pub ticket: Option<String>,
}

/// Timing rules applied by the engine.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// How far in the past a new slot may start.
    pub past_grace: Duration,
    /// Cancellations close this long before the start.
    pub cancel_cutoff: Duration,
    /// Payment orders can still be opened this long after the start.
    pub order_grace: Duration,
    pub refund_retry: RetryPolicy,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            past_grace: Duration::minutes(2),
            cancel_cutoff: Duration::hours(2),
            order_grace: Duration::minutes(5),
            refund_retry: RetryPolicy::default(),
        }
    }
}

const MSG_PAYMENT_OK: &str = "Payment successful! Your booking has been confirmed.";
const MSG_CANCELED: &str = "Booking canceled.";
const MSG_CANCELED_REFUND: &str = "Booking canceled. Refund initiated.";
const MSG_REFUND_APPROVED: &str = "Your refund request has been APPROVED. Money sent to source.";
const MSG_REFUND_REJECTED: &str = "Your refund request has been REJECTED by the venue owner.";

/// Booking lifecycle: creation, payment, cancellation, attendance and refunds.
pub struct BookingEngine {
    store: Arc<dyn BookingStore>,
    directory: Arc<dyn Directory>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    mailer: Option<Arc<dyn Mailer>>,
    tickets: TicketSigner,
    policy: BookingPolicy,
}

impl BookingEngine {
    pub fn new(
        store: Arc<dyn BookingStore>,
        directory: Arc<dyn Directory>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        tickets: TicketSigner,
    ) -> Self {
        Self {
            store,
            directory,
            gateway,
            notifier,
            mailer: None,
            tickets,
            policy: BookingPolicy::default(),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_policy(mut self, policy: BookingPolicy) -> Self {
        self.policy = policy;
        self
    }

    // ── Availability ────────────────────────────────────────────────

    /// True when no occupying booking overlaps `[start, end)`.
    pub async fn is_available(
        &self,
        venue_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BookingResult<bool> {
        validate_range(start, end)?;
        let count = self.store.count_overlapping(venue_id, start, end).await?;
        Ok(count == 0)
    }

    /// Occupied slots starting on `date` (UTC).
    pub async fn booked_slots(
        &self,
        venue_id: i64,
        date: NaiveDate,
    ) -> BookingResult<Vec<BookedSlotRow>> {
        let from = date.and_time(NaiveTime::MIN).and_utc();
        let to = from + Duration::days(1);
        Ok(self.store.booked_slots(venue_id, from, to).await?)
    }

    // ── Creation ────────────────────────────────────────────────────

    pub async fn create_booking(
        &self,
        request: BookingRequest,
        requester_id: i64,
    ) -> BookingResult<BookingRow> {
        let venue = self
            .directory
            .venue(request.venue_id)
            .await?
            .filter(VenueRow::is_bookable)
            .ok_or(BookingError::NotFound("venue"))?;

        self.check_slot(&request, Utc::now()).await?;

        let seconds = (request.end_time - request.start_time).num_seconds();
        let total_price = venue.price_per_hour.prorate_hourly(seconds);

        let row = self
            .store
            .insert_checked(NewBooking {
                user_id: requester_id,
                venue_id: venue.id,
                start_time: request.start_time,
                end_time: request.end_time,
                total_price,
                status: BookingStatus::Pending,
            })
            .await?;

        info!(
            booking_id = row.id,
            venue_id = row.venue_id,
            user_id = row.user_id,
            total_price = %row.total_price,
            "Booking created"
        );

        self.notify(
            row.user_id,
            format!(
                "Booking at {} is reserved. Complete payment to confirm it.",
                venue.name
            ),
            Severity::Info,
        );
        self.send_confirmation(&row, &venue);

        Ok(row)
    }

    /// Reserve a slot on behalf of the venue, free of charge.
    pub async fn block_slot(&self, request: BookingRequest, actor: &Actor) -> BookingResult<BookingRow> {
        let venue = self
            .directory
            .venue(request.venue_id)
            .await?
            .ok_or(BookingError::NotFound("venue"))?;

        authorize_venue(actor, &venue)?;
        self.check_slot(&request, Utc::now()).await?;

        let row = self
            .store
            .insert_checked(NewBooking {
                user_id: actor.user_id,
                venue_id: venue.id,
                start_time: request.start_time,
                end_time: request.end_time,
                total_price: Money::ZERO,
                status: BookingStatus::Confirmed,
            })
            .await?;

        info!(booking_id = row.id, venue_id = row.venue_id, "Slot blocked");
        Ok(row)
    }

    async fn check_slot(&self, request: &BookingRequest, now: DateTime<Utc>) -> BookingResult<()> {
        validate_range(request.start_time, request.end_time)?;
        if request.start_time < now - self.policy.past_grace {
            return Err(BookingError::PastSlot);
        }
        if !self
            .is_available(request.venue_id, request.start_time, request.end_time)
            .await?
        {
            return Err(BookingError::SlotTaken);
        }
        Ok(())
    }

    // ── Payment ─────────────────────────────────────────────────────

    pub async fn create_payment_order(
        &self,
        booking_id: i64,
        actor: &Actor,
    ) -> BookingResult<PaymentOrder> {
        let row = self.load(booking_id).await?;
        authorize(actor, &row, Action::Pay)?;

        if Utc::now() > row.start_time + self.policy.order_grace {
            return Err(BookingError::SlotExpired);
        }
        match row.status {
            BookingStatus::Pending => {}
            BookingStatus::Confirmed | BookingStatus::Present => return Err(BookingError::AlreadyPaid),
            status => return Err(BookingError::InvalidState { status }),
        }

        let order = self.gateway.create_order(row.id, row.total_price).await?;

        // Payments are later accepted only against the latest attached order.
        if self.store.attach_order(row.id, &order.order_ref).await?.is_none() {
            let current = self.load(row.id).await?;
            return Err(BookingError::InvalidState {
                status: current.status,
            });
        }
        info!(booking_id = row.id, order_ref = %order.order_ref, "Payment order created");

        Ok(PaymentOrder {
            booking_id: row.id,
            order_ref: order.order_ref,
            amount: order.amount,
            currency: order.currency,
            key_id: self.gateway.key_id().to_string(),
        })
    }

    /// Record a payment captured against the booking's order. Repeating the
    /// call with the same reference returns the confirmed booking without
    /// side effects.
    pub async fn confirm_payment(
        &self,
        booking_id: i64,
        order_ref: &str,
        payment_ref: &str,
    ) -> BookingResult<BookingRow> {
        let (order_ref, payment_ref) = (order_ref.trim(), payment_ref.trim());
        if order_ref.is_empty() || payment_ref.is_empty() {
            return Err(BookingError::InvalidInput(
                "order and payment references are required".to_string(),
            ));
        }

        match self
            .store
            .confirm_payment(booking_id, order_ref, payment_ref)
            .await?
        {
            ConfirmOutcome::Confirmed(row) => {
                info!(booking_id, payment_ref, "Booking confirmed");
                self.notify(row.user_id, MSG_PAYMENT_OK.to_string(), Severity::Success);
                Ok(row)
            }
            ConfirmOutcome::AlreadyConfirmed(row) => Ok(row),
            ConfirmOutcome::NotPending(row) => match row.status {
                BookingStatus::Confirmed | BookingStatus::Present => Err(BookingError::AlreadyPaid),
                BookingStatus::Canceled => {
                    warn!(
                        booking_id,
                        payment_ref, "Payment received for a canceled booking; manual refund needed"
                    );
                    Err(BookingError::InvalidState { status: row.status })
                }
                status => Err(BookingError::InvalidState { status }),
            },
            ConfirmOutcome::OrderMismatch(_) => {
                warn!(booking_id, order_ref, "Rejected payment for another order");
                Err(BookingError::OrderMismatch)
            }
            ConfirmOutcome::Missing => Err(BookingError::NotFound("booking")),
        }
    }

    pub async fn verify_payment(
        &self,
        booking_id: i64,
        order_ref: &str,
        payment_ref: &str,
        signature: &str,
        actor: &Actor,
    ) -> BookingResult<BookingRow> {
        let row = self.load(booking_id).await?;
        authorize(actor, &row, Action::Pay)?;

        if !self.gateway.verify_signature(order_ref, payment_ref, signature) {
            warn!(booking_id, order_ref, "Rejected payment with bad signature");
            return Err(BookingError::InvalidSignature);
        }

        self.confirm_payment(booking_id, order_ref, payment_ref).await
    }

    // ── Cancellation & refunds ──────────────────────────────────────

    pub async fn cancel_booking(&self, booking_id: i64, actor: &Actor) -> BookingResult<BookingRow> {
        let row = self.load(booking_id).await?;
        let guard = authorize(actor, &row, Action::Cancel)?;

        if row.start_time - Utc::now() < self.policy.cancel_cutoff {
            return Err(BookingError::TooLateToCancel {
                cutoff_minutes: self.policy.cancel_cutoff.num_minutes(),
            });
        }

        let (updated, message) = match row.status {
            BookingStatus::Pending => (
                self.apply(&row, &[BookingStatus::Pending], BookingStatus::Canceled, guard)
                    .await?,
                MSG_CANCELED,
            ),
            BookingStatus::Confirmed => (
                self.refund(&row, BookingStatus::Confirmed, guard).await?,
                MSG_CANCELED_REFUND,
            ),
            status => return Err(BookingError::InvalidState { status }),
        };

        info!(booking_id, status = updated.status.as_str(), "Booking canceled by holder");
        self.notify(updated.user_id, message.to_string(), Severity::Warning);

        Ok(updated)
    }

    pub async fn manage_attendance(
        &self,
        booking_id: i64,
        actor: &Actor,
        action: AttendanceAction,
    ) -> BookingResult<BookingRow> {
        let row = self.load(booking_id).await?;
        let guard = authorize(actor, &row, Action::ManageAttendance)?;
        self.ensure_guard(guard, &row).await?;

        let (updated, message, severity) = match (action, row.status) {
            (AttendanceAction::Present, BookingStatus::Confirmed) => (
                self.apply(&row, &[BookingStatus::Confirmed], BookingStatus::Present, guard)
                    .await?,
                "You have been marked present. Enjoy your game!",
                Severity::Success,
            ),
            (AttendanceAction::Absent, BookingStatus::Confirmed) => (
                self.apply(&row, &[BookingStatus::Confirmed], BookingStatus::Absent, guard)
                    .await?,
                "You were marked absent for your booking.",
                Severity::Warning,
            ),
            (AttendanceAction::Cancel, BookingStatus::Pending) => (
                self.apply(&row, &[BookingStatus::Pending], BookingStatus::Canceled, guard)
                    .await?,
                "Your booking was canceled by the venue.",
                Severity::Warning,
            ),
            (AttendanceAction::Cancel, BookingStatus::Confirmed) => {
                if row.payment_reference().is_some() {
                    (
                        self.refund(&row, BookingStatus::Confirmed, guard).await?,
                        "Your booking was canceled by the venue. Refund initiated.",
                        Severity::Warning,
                    )
                } else if row.total_price.is_zero() {
                    (
                        self.apply(&row, &[BookingStatus::Confirmed], BookingStatus::Canceled, guard)
                            .await?,
                        "Your booking was canceled by the venue.",
                        Severity::Warning,
                    )
                } else {
                    return Err(BookingError::MissingPaymentRef);
                }
            }
            (_, status) => return Err(BookingError::InvalidState { status }),
        };

        info!(
            booking_id,
            actor_id = actor.user_id,
            ?action,
            status = updated.status.as_str(),
            "Attendance updated"
        );
        self.notify(updated.user_id, message.to_string(), severity);

        Ok(updated)
    }

    pub async fn request_refund(&self, booking_id: i64, actor: &Actor) -> BookingResult<BookingRow> {
        let row = self.load(booking_id).await?;
        let guard = authorize(actor, &row, Action::RequestRefund)?;

        if row.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidState { status: row.status });
        }

        let updated = self
            .apply(&row, &[BookingStatus::Confirmed], BookingStatus::RefundRequested, guard)
            .await?;

        info!(booking_id, "Refund requested");
        self.notify(
            updated.user_id,
            "Your refund request has been sent to the venue owner.".to_string(),
            Severity::Info,
        );

        Ok(updated)
    }

    pub async fn decide_refund(
        &self,
        booking_id: i64,
        actor: &Actor,
        decision: RefundDecision,
    ) -> BookingResult<BookingRow> {
        let row = self.load(booking_id).await?;
        let guard = authorize(actor, &row, Action::DecideRefund)?;
        self.ensure_guard(guard, &row).await?;

        if row.status != BookingStatus::RefundRequested {
            return Err(BookingError::InvalidState { status: row.status });
        }

        let (updated, message) = match decision {
            RefundDecision::Approve => (
                self.refund(&row, BookingStatus::RefundRequested, guard)
                    .await?,
                MSG_REFUND_APPROVED,
            ),
            RefundDecision::Reject => (
                self.apply(
                    &row,
                    &[BookingStatus::RefundRequested],
                    BookingStatus::RefundRejected,
                    guard,
                )
                .await?,
                MSG_REFUND_REJECTED,
            ),
        };

        info!(booking_id, ?decision, "Refund decided");
        self.notify(updated.user_id, message.to_string(), Severity::Info);

        Ok(updated)
    }

    /// Claim the booking for a refund, refund the full price through the
    /// gateway, then mark it refunded. Only the caller whose claim lands
    /// reaches the gateway; a failed refund hands the booking back.
    async fn refund(
        &self,
        row: &BookingRow,
        from: BookingStatus,
        guard: Guard,
    ) -> BookingResult<BookingRow> {
        let payment_ref = row
            .payment_reference()
            .ok_or(BookingError::MissingPaymentRef)?;

        self.apply(row, &[from], BookingStatus::RefundPending, guard)
            .await?;

        let idempotency_key = format!("refund-booking-{}", row.id);
        let refunded = retry_transient(&self.policy.refund_retry, "refund", || {
            self.gateway
                .refund(payment_ref, row.total_price, &idempotency_key)
        })
        .await;

        let refund_ref = match refunded {
            Ok(refund_ref) => refund_ref,
            Err(e) => {
                error!(booking_id = row.id, "Refund failed: {}", e);
                self.release_refund_claim(row.id, from).await;
                return Err(e.into());
            }
        };

        info!(booking_id = row.id, %refund_ref, amount = %row.total_price, "Refund issued");

        match self
            .store
            .transition(row.id, &[BookingStatus::RefundPending], BookingStatus::Refunded, Guard::Any)
            .await?
        {
            Some(updated) => Ok(updated),
            None => {
                error!(
                    booking_id = row.id,
                    %refund_ref,
                    "Refund issued but booking left the refund claim"
                );
                Err(self
                    .explain_miss(row.id, &[BookingStatus::RefundPending], Guard::Any)
                    .await)
            }
        }
    }

    async fn release_refund_claim(&self, booking_id: i64, back_to: BookingStatus) {
        match self
            .store
            .transition(booking_id, &[BookingStatus::RefundPending], back_to, Guard::Any)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => warn!(booking_id, "Refund claim was already released"),
            Err(e) => error!(booking_id, "Failed to release refund claim: {}", e),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn get_booking(&self, booking_id: i64, actor: &Actor) -> BookingResult<BookingRow> {
        let row = self.load(booking_id).await?;
        let guard = authorize(actor, &row, Action::View)?;
        self.ensure_guard(guard, &row).await?;
        Ok(row)
    }

    pub async fn list_user_bookings(&self, user_id: i64) -> BookingResult<Vec<TicketedBooking>> {
        let rows = self.store.list_by_user(user_id).await?;
        Ok(rows
            .into_iter()
            .map(|booking| TicketedBooking {
                ticket: booking
                    .status
                    .admits_entry()
                    .then(|| self.tickets.sign(booking.id)),
                booking,
            })
            .collect())
    }

    pub async fn list_venue_bookings(
        &self,
        venue_id: i64,
        actor: &Actor,
    ) -> BookingResult<Vec<BookingRow>> {
        let venue = self
            .directory
            .venue(venue_id)
            .await?
            .ok_or(BookingError::NotFound("venue"))?;
        authorize_venue(actor, &venue)?;

        Ok(self.store.list_by_venue(venue_id).await?)
    }

    pub async fn list_all_bookings(&self, actor: &Actor) -> BookingResult<Vec<AdminBookingRow>> {
        authorize_admin(actor)?;
        Ok(self.store.list_all().await?)
    }

    /// Check a presented ticket token and return its booking. Only paid
    /// bookings admit entry.
    pub async fn verify_ticket(&self, token: &str, actor: &Actor) -> BookingResult<BookingRow> {
        let booking_id = self
            .tickets
            .verify(token)
            .ok_or(BookingError::Forbidden("invalid ticket"))?;
        let row = self.get_booking(booking_id, actor).await?;

        if !row.status.admits_entry() {
            return Err(BookingError::InvalidState { status: row.status });
        }
        Ok(row)
    }

    // ── Helpers ─────────────────────────────────────────────────────

    async fn load(&self, booking_id: i64) -> BookingResult<BookingRow> {
        self.store
            .find(booking_id)
            .await?
            .ok_or(BookingError::NotFound("booking"))
    }

    async fn apply(
        &self,
        row: &BookingRow,
        from: &[BookingStatus],
        to: BookingStatus,
        guard: Guard,
    ) -> BookingResult<BookingRow> {
        debug_assert!(
            from.iter().all(|status| status.can_transition_to(to)),
            "illegal transition {from:?} -> {to:?}"
        );
        match self.store.transition(row.id, from, to, guard).await? {
            Some(updated) => Ok(updated),
            None => Err(self.explain_miss(row.id, from, guard).await),
        }
    }

    /// Venue-owner guards need the venue; fail early before any gateway call.
    async fn ensure_guard(&self, guard: Guard, row: &BookingRow) -> BookingResult<()> {
        let venue = match guard {
            Guard::VenueOwner(_) => self.directory.venue(row.venue_id).await?,
            _ => None,
        };

        if guard_admits(guard, row, venue.as_ref()) {
            Ok(())
        } else {
            Err(BookingError::Forbidden("you do not manage this venue"))
        }
    }

    /// Work out why a conditional update matched nothing.
    async fn explain_miss(&self, booking_id: i64, expected: &[BookingStatus], guard: Guard) -> BookingError {
        let row = match self.store.find(booking_id).await {
            Ok(Some(row)) => row,
            Ok(None) => return BookingError::NotFound("booking"),
            Err(e) => return e.into(),
        };

        if let Err(e) = self.ensure_guard(guard, &row).await {
            return e;
        }
        if expected.contains(&row.status) {
            return BookingError::Contended;
        }
        BookingError::InvalidState { status: row.status }
    }

    fn notify(&self, user_id: i64, message: String, severity: Severity) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(user_id, &message, severity).await {
                warn!(user_id, "Failed to deliver notification: {}", e);
            }
        });
    }

    fn send_confirmation(&self, row: &BookingRow, venue: &VenueRow) {
        let Some(mailer) = self.mailer.clone() else {
            return;
        };
        let directory = Arc::clone(&self.directory);
        let confirmation = BookingConfirmation {
            booking_id: row.id,
            venue_name: venue.name.clone(),
            venue_address: venue.address.clone(),
            start_time: row.start_time,
            end_time: row.end_time,
            total_price: row.total_price,
            ticket_url: self.tickets.download_url(row.id),
        };
        let user_id = row.user_id;

        tokio::spawn(async move {
            let contact = match directory.contact(user_id).await {
                Ok(Some(contact)) => contact,
                Ok(None) => {
                    warn!(user_id, "No contact on file, skipping confirmation email");
                    return;
                }
                Err(e) => {
                    warn!(user_id, "Contact lookup failed: {}", e);
                    return;
                }
            };

            if let Err(e) = mailer.send_booking_confirmation(&contact, &confirmation).await {
                warn!(
                    booking_id = confirmation.booking_id,
                    "Failed to send confirmation email to {}: {}", contact.email, e
                );
            }
        });
    }
}

fn validate_range(start: DateTime<Utc>, end: DateTime<Utc>) -> BookingResult<()> {
    if end <= start {
        return Err(BookingError::InvalidRange);
    }
    Ok(())
}
