use async_graphql::{Context, Object, Result, ID};

use super::types::{PaymentOrder, VerifyPaymentInput};
use crate::auth::permissions::require_actor;
use crate::gql::common::helpers::parse_id;
use crate::gql::domains::bookings::types::Booking;
use crate::gql::error::BookingResultExt;
use crate::state::AppState;

#[derive(Default)]
pub struct PaymentMutation;

#[Object]
impl PaymentMutation {
    /// Open a gateway order for a pending booking
    async fn create_payment_order(&self, ctx: &Context<'_>, booking_id: ID) -> Result<PaymentOrder> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let booking_id = parse_id(&booking_id, "booking")?;

        let order = state
            .engine()
            .create_payment_order(booking_id, &actor)
            .await
            .gql()?;
        Ok(order.into())
    }

    /// Check the gateway signature and confirm the booking
    async fn verify_payment(&self, ctx: &Context<'_>, input: VerifyPaymentInput) -> Result<Booking> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let booking_id = parse_id(&input.booking_id, "booking")?;

        let row = state
            .engine()
            .verify_payment(
                booking_id,
                &input.order_id,
                &input.payment_id,
                &input.signature,
                &actor,
            )
            .await
            .gql()?;
        Ok(row.into())
    }
}
