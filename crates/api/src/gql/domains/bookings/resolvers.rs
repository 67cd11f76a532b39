use async_graphql::{Context, Object, Result, ID};
use chrono::{DateTime, NaiveDate, Utc};

use super::types::{
    AdminBooking, BookedSlot, Booking, CreateBookingInput, DecideRefundInput,
    ManageAttendanceInput, MyBooking,
};
use crate::auth::permissions::require_actor;
use crate::booking::BookingRequest;
use crate::gql::common::helpers::parse_id;
use crate::gql::error::BookingResultExt;
use crate::state::AppState;

impl CreateBookingInput {
    fn to_request(&self) -> Result<BookingRequest> {
        Ok(BookingRequest {
            venue_id: parse_id(&self.venue_id, "venue")?,
            start_time: self.start_time,
            end_time: self.end_time,
        })
    }
}

#[derive(Default)]
pub struct BookingQuery;

#[Object]
impl BookingQuery {
    /// Get a booking visible to the caller
    async fn booking(&self, ctx: &Context<'_>, id: ID) -> Result<Booking> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let booking_id = parse_id(&id, "booking")?;

        let row = state.engine().get_booking(booking_id, &actor).await.gql()?;
        Ok(row.into())
    }

    /// The caller's bookings, newest first, each with its ticket token
    async fn my_bookings(&self, ctx: &Context<'_>) -> Result<Vec<MyBooking>> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;

        let rows = state.engine().list_user_bookings(actor.user_id).await.gql()?;
        Ok(rows.into_iter().map(MyBooking::from).collect())
    }

    /// All bookings of a venue (venue owner or admin)
    async fn venue_bookings(&self, ctx: &Context<'_>, venue_id: ID) -> Result<Vec<Booking>> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let venue_id = parse_id(&venue_id, "venue")?;

        let rows = state
            .engine()
            .list_venue_bookings(venue_id, &actor)
            .await
            .gql()?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }

    /// Every booking across venues, newest first (admin only)
    async fn all_bookings(&self, ctx: &Context<'_>) -> Result<Vec<AdminBooking>> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;

        let rows = state.engine().list_all_bookings(&actor).await.gql()?;
        Ok(rows.into_iter().map(AdminBooking::from).collect())
    }

    /// Whether `[startTime, endTime)` is free at the venue; an empty or
    /// inverted range is an `INVALID_INPUT` error
    async fn slot_available(
        &self,
        ctx: &Context<'_>,
        venue_id: ID,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<bool> {
        let state = ctx.data::<AppState>()?;
        let venue_id = parse_id(&venue_id, "venue")?;

        state
            .engine()
            .is_available(venue_id, start_time, end_time)
            .await
            .gql()
    }

    /// Occupied slots starting on `date` (UTC)
    async fn booked_slots(
        &self,
        ctx: &Context<'_>,
        venue_id: ID,
        date: NaiveDate,
    ) -> Result<Vec<BookedSlot>> {
        let state = ctx.data::<AppState>()?;
        let venue_id = parse_id(&venue_id, "venue")?;

        let slots = state.engine().booked_slots(venue_id, date).await.gql()?;
        Ok(slots.into_iter().map(BookedSlot::from).collect())
    }

    /// Resolve a ticket token presented at the venue
    async fn verify_ticket(&self, ctx: &Context<'_>, token: String) -> Result<Booking> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;

        let row = state.engine().verify_ticket(&token, &actor).await.gql()?;
        Ok(row.into())
    }
}

#[derive(Default)]
pub struct BookingMutation;

#[Object]
impl BookingMutation {
    /// Reserve a slot for the caller; the booking stays pending until paid
    async fn create_booking(
        &self,
        ctx: &Context<'_>,
        input: CreateBookingInput,
    ) -> Result<Booking> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let request = input.to_request()?;

        let row = state
            .engine()
            .create_booking(request, actor.user_id)
            .await
            .gql()?;
        Ok(row.into())
    }

    /// Block a slot at the caller's venue without payment
    async fn block_slot(&self, ctx: &Context<'_>, input: CreateBookingInput) -> Result<Booking> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let request = input.to_request()?;

        let row = state.engine().block_slot(request, &actor).await.gql()?;
        Ok(row.into())
    }

    async fn cancel_booking(&self, ctx: &Context<'_>, id: ID) -> Result<Booking> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let booking_id = parse_id(&id, "booking")?;

        let row = state.engine().cancel_booking(booking_id, &actor).await.gql()?;
        Ok(row.into())
    }

    /// Mark attendance or cancel as the venue owner
    async fn manage_attendance(
        &self,
        ctx: &Context<'_>,
        input: ManageAttendanceInput,
    ) -> Result<Booking> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let booking_id = parse_id(&input.booking_id, "booking")?;

        let row = state
            .engine()
            .manage_attendance(booking_id, &actor, input.action.into())
            .await
            .gql()?;
        Ok(row.into())
    }

    async fn request_refund(&self, ctx: &Context<'_>, id: ID) -> Result<Booking> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let booking_id = parse_id(&id, "booking")?;

        let row = state.engine().request_refund(booking_id, &actor).await.gql()?;
        Ok(row.into())
    }

    /// Approve or reject a pending refund request
    async fn decide_refund(&self, ctx: &Context<'_>, input: DecideRefundInput) -> Result<Booking> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let booking_id = parse_id(&input.booking_id, "booking")?;

        let row = state
            .engine()
            .decide_refund(booking_id, &actor, input.decision.into())
            .await
            .gql()?;
        Ok(row.into())
    }
}
