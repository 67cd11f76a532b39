use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use infra::Money;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("payment gateway unreachable: {0}")]
    Network(String),

    #[error("payment gateway returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected payment gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Worth another attempt: connection failures, throttling and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::Api { status, .. } => *status == 429 || *status >= 500,
            GatewayError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub order_ref: String,
    pub amount: Money,
    pub currency: String,
}

/// Third-party payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key handed to checkout clients.
    fn key_id(&self) -> &str;

    async fn create_order(&self, booking_id: i64, amount: Money)
        -> Result<GatewayOrder, GatewayError>;

    /// Checks the processor's signature over `order_ref|payment_ref`.
    fn verify_signature(&self, order_ref: &str, payment_ref: &str, signature: &str) -> bool;

    /// Refund `amount` against a captured payment; returns the refund reference.
    /// The same `idempotency_key` is sent on every retry, and a refund already
    /// recorded under it is returned instead of issuing another.
    async fn refund(
        &self,
        payment_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<String, GatewayError>;
}

/// Hex HMAC-SHA256 of `order_ref|payment_ref` keyed by the gateway secret.
pub fn payment_signature(secret: &str, order_ref: &str, payment_ref: &str) -> String {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(order_ref.as_bytes());
    mac.update(b"|");
    mac.update(payment_ref.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
