use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use infra::Money;

use super::gateway::{payment_signature, GatewayError, GatewayOrder, PaymentGateway};

const DEFAULT_BASE_URL: &str = "https://api.razorpay.com/v1";

#[derive(Clone, Debug)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
    pub base_url: String,
}

impl RazorpayConfig {
    pub fn from_env() -> Option<Self> {
        let key_id = std::env::var("RAZORPAY_KEY_ID").ok()?;
        let key_secret = std::env::var("RAZORPAY_KEY_SECRET").ok()?;

        Some(Self {
            key_id,
            key_secret,
            currency: std::env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            base_url: std::env::var("RAZORPAY_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        })
    }
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
    #[serde(default)]
    receipt: Option<String>,
}

#[derive(Deserialize)]
struct RefundList {
    items: Vec<RefundResponse>,
}

impl RefundList {
    /// Refund previously created under `receipt`, if any.
    fn find_receipt(&self, receipt: &str) -> Option<&str> {
        self.items
            .iter()
            .find(|refund| refund.receipt.as_deref() == Some(receipt))
            .map(|refund| refund.id.as_str())
    }
}

#[derive(Clone)]
pub struct RazorpayGateway {
    config: RazorpayConfig,
    client: reqwest::Client,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.config.base_url, path);
        let request = self.client.post(&url).json(&body);
        self.send(request).await
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.config.base_url, path);
        self.send(self.client.get(&url)).await
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api { status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.config.key_id
    }

    async fn create_order(
        &self,
        booking_id: i64,
        amount: Money,
    ) -> Result<GatewayOrder, GatewayError> {
        let body = json!({
            "amount": amount.minor(),
            "currency": self.config.currency,
            "receipt": format!("booking_{}", booking_id),
            "payment_capture": 1,
        });

        let order: OrderResponse = self.post("/orders", body).await?;
        info!(booking_id, order_ref = %order.id, "Razorpay order created");

        Ok(GatewayOrder {
            order_ref: order.id,
            amount,
            currency: self.config.currency.clone(),
        })
    }

    fn verify_signature(&self, order_ref: &str, payment_ref: &str, signature: &str) -> bool {
        let expected = payment_signature(&self.config.key_secret, order_ref, payment_ref);
        constant_time_eq::constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }

    async fn refund(
        &self,
        payment_ref: &str,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<String, GatewayError> {
        let payment = urlencoding::encode(payment_ref);

        // Receipts are not deduplicated by the gateway; a retry after a lost
        // response must find the refund it already created.
        let existing: RefundList = self.get(&format!("/payments/{payment}/refunds")).await?;
        if let Some(refund_ref) = existing.find_receipt(idempotency_key) {
            info!(payment_ref, refund_ref, "Razorpay refund already exists");
            return Ok(refund_ref.to_string());
        }

        let body = json!({
            "amount": amount.minor(),
            "speed": "normal",
            "receipt": idempotency_key,
        });

        let refund: RefundResponse = self
            .post(&format!("/payments/{payment}/refund"), body)
            .await?;
        info!(payment_ref, refund_ref = %refund.id, "Razorpay refund initiated");

        Ok(refund.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> RazorpayGateway {
        RazorpayGateway::new(RazorpayConfig {
            key_id: "rzp_test_key".into(),
            key_secret: "rzp_test_secret".into(),
            currency: "INR".into(),
            base_url: DEFAULT_BASE_URL.into(),
        })
    }

    #[test]
    fn accepts_signature_made_with_key_secret() {
        let gw = gateway();
        let sig = payment_signature("rzp_test_secret", "order_9", "pay_9");
        assert!(gw.verify_signature("order_9", "pay_9", &sig));
    }

    #[test]
    fn rejects_tampered_signature() {
        let gw = gateway();
        let sig = payment_signature("rzp_test_secret", "order_9", "pay_9");
        assert!(!gw.verify_signature("order_9", "pay_10", &sig));
        assert!(!gw.verify_signature("order_9", "pay_9", "deadbeef"));
        assert!(!gw.verify_signature("order_9", "pay_9", ""));
    }

    #[test]
    fn existing_refund_is_found_by_receipt() {
        let list: RefundList = serde_json::from_value(json!({
            "entity": "collection",
            "count": 2,
            "items": [
                { "id": "rfnd_a", "receipt": "refund-booking-3" },
                { "id": "rfnd_b", "receipt": null },
            ],
        }))
        .unwrap();

        assert_eq!(list.find_receipt("refund-booking-3"), Some("rfnd_a"));
        assert_eq!(list.find_receipt("refund-booking-4"), None);
    }
}
