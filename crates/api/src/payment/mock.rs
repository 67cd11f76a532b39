use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use infra::Money;

use super::gateway::{payment_signature, GatewayError, GatewayOrder, PaymentGateway};

/// Development gateway: orders and refunds always succeed.
///
/// Signatures use the same scheme as the live gateway, keyed by `secret`, so
/// a client can produce valid ones with [`MockGateway::sign`].
pub struct MockGateway {
    secret: String,
    counter: AtomicU64,
    /// Refund references by idempotency key.
    refunds: Mutex<HashMap<String, String>>,
}

impl MockGateway {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            counter: AtomicU64::new(0),
            refunds: Mutex::new(HashMap::new()),
        }
    }

    pub fn sign(&self, order_ref: &str, payment_ref: &str) -> String {
        payment_signature(&self.secret, order_ref, payment_ref)
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn key_id(&self) -> &str {
        "mock_key"
    }

    async fn create_order(
        &self,
        booking_id: i64,
        amount: Money,
    ) -> Result<GatewayOrder, GatewayError> {
        let order_ref = format!("order_mock_{}_{}", booking_id, self.next());
        info!(booking_id, %order_ref, "Mock order created");

        Ok(GatewayOrder {
            order_ref,
            amount,
            currency: "INR".to_string(),
        })
    }

    fn verify_signature(&self, order_ref: &str, payment_ref: &str, signature: &str) -> bool {
        let expected = self.sign(order_ref, payment_ref);
        constant_time_eq::constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }

    async fn refund(
        &self,
        payment_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<String, GatewayError> {
        let mut refunds = self.refunds.lock();
        if let Some(existing) = refunds.get(idempotency_key) {
            info!(payment_ref, idempotency_key, "Mock refund already issued");
            return Ok(existing.clone());
        }

        let refund_ref = format!("rfnd_mock_{}", self.next());
        info!(payment_ref, %amount, idempotency_key, %refund_ref, "Mock refund issued");
        refunds.insert(idempotency_key.to_string(), refund_ref.clone());
        Ok(refund_ref)
    }
}
