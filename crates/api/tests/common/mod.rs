#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use api::booking::{BookingEngine, BookingPolicy, TicketSigner};
use api::payment::{payment_signature, GatewayError, GatewayOrder, PaymentGateway, RetryPolicy};
use api::services::notification_service::NotifyError;
use api::services::{Notifier, Severity};
use infra::memory::InMemoryBackend;
use infra::models::{UserContactRow, VenueRow};
use infra::Money;

pub const VENUE: i64 = 1;
pub const OTHER_VENUE: i64 = 2;
pub const UNAPPROVED_VENUE: i64 = 3;
pub const OWNER: i64 = 100;
pub const OTHER_OWNER: i64 = 200;
pub const ADMIN: i64 = 900;
pub const PLAYER: i64 = 10;
pub const OTHER_PLAYER: i64 = 11;

pub const GATEWAY_SECRET: &str = "gateway-test-secret";

/// Gateway double that records refunds and can be told to fail.
#[derive(Default)]
pub struct RecordingGateway {
    refunds: Mutex<Vec<(String, Money, String)>>,
    refund_attempts: AtomicU32,
    transient_failures: AtomicU32,
    reject_refunds: Mutex<bool>,
    refund_delay: Mutex<Option<Duration>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` refund attempts with a 503.
    pub fn fail_transiently(&self, n: u32) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Fail every refund with a 400.
    pub fn reject_refunds(&self) {
        *self.reject_refunds.lock() = true;
    }

    /// Hold every refund call for `delay` before answering.
    pub fn slow_refunds(&self, delay: Duration) {
        *self.refund_delay.lock() = Some(delay);
    }

    pub fn refunds(&self) -> Vec<(String, Money, String)> {
        self.refunds.lock().clone()
    }

    pub fn refund_attempts(&self) -> u32 {
        self.refund_attempts.load(Ordering::SeqCst)
    }

    pub fn sign(order_ref: &str, payment_ref: &str) -> String {
        payment_signature(GATEWAY_SECRET, order_ref, payment_ref)
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    fn key_id(&self) -> &str {
        "test_key"
    }

    async fn create_order(
        &self,
        booking_id: i64,
        amount: Money,
    ) -> Result<GatewayOrder, GatewayError> {
        Ok(GatewayOrder {
            order_ref: format!("order_{booking_id}"),
            amount,
            currency: "INR".to_string(),
        })
    }

    fn verify_signature(&self, order_ref: &str, payment_ref: &str, signature: &str) -> bool {
        Self::sign(order_ref, payment_ref) == signature
    }

    async fn refund(
        &self,
        payment_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<String, GatewayError> {
        self.refund_attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.refund_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.reject_refunds.lock() {
            return Err(GatewayError::Api {
                status: 400,
                body: "payment not refundable".to_string(),
            });
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(GatewayError::Api {
                status: 503,
                body: "try again".to_string(),
            });
        }

        let mut refunds = self.refunds.lock();
        refunds.push((
            payment_ref.to_string(),
            amount,
            idempotency_key.to_string(),
        ));
        Ok(format!("rfnd_{}", refunds.len()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String, Severity)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(i64, String, Severity)> {
        self.sent.lock().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.sent.lock().iter().filter(|(_, _, s)| *s == severity).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: i64, message: &str, severity: Severity) -> Result<(), NotifyError> {
        self.sent.lock().push((user_id, message.to_string(), severity));
        Ok(())
    }
}

pub struct Harness {
    pub backend: Arc<InMemoryBackend>,
    pub gateway: Arc<RecordingGateway>,
    pub notifier: Arc<RecordingNotifier>,
    pub engine: Arc<BookingEngine>,
}

fn venue(id: i64, owner_id: i64, status: &str) -> VenueRow {
    VenueRow {
        id,
        owner_id,
        name: format!("Court {id}"),
        address: "12 MG Road, Bengaluru".to_string(),
        price_per_hour: Money::from_major(500),
        status: status.to_string(),
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

pub fn harness() -> Harness {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_venue(venue(VENUE, OWNER, "approved"));
    backend.add_venue(venue(OTHER_VENUE, OTHER_OWNER, "approved"));
    backend.add_venue(venue(UNAPPROVED_VENUE, OWNER, "pending"));
    backend.add_contact(UserContactRow {
        id: PLAYER,
        email: "player@example.com".to_string(),
        first_name: "Asha".to_string(),
        last_name: None,
    });

    let gateway = Arc::new(RecordingGateway::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let engine = BookingEngine::new(
        backend.clone(),
        backend.clone(),
        gateway.clone(),
        notifier.clone(),
        TicketSigner::new("ticket-test-secret", "https://app.example.com"),
    )
    .with_policy(BookingPolicy {
        refund_retry: fast_retry(),
        ..BookingPolicy::default()
    });

    Harness {
        backend,
        gateway,
        notifier,
        engine: Arc::new(engine),
    }
}

/// Let spawned notification tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Start of an hour slot `hours_ahead` hours from now.
pub fn hours_from_now(hours_ahead: i64) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::hours(hours_ahead)
}
