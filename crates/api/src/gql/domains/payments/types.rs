use async_graphql::{InputObject, SimpleObject, ID};

use crate::booking::PaymentOrder as EnginePaymentOrder;

/// What the checkout widget needs to collect a payment.
#[derive(SimpleObject, Clone)]
pub struct PaymentOrder {
    pub booking_id: ID,
    pub order_id: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

impl From<EnginePaymentOrder> for PaymentOrder {
    fn from(order: EnginePaymentOrder) -> Self {
        Self {
            booking_id: ID::from(order.booking_id.to_string()),
            order_id: order.order_ref,
            amount: order.amount.minor(),
            currency: order.currency,
            key_id: order.key_id,
        }
    }
}

#[derive(InputObject)]
pub struct VerifyPaymentInput {
    pub booking_id: ID,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}
