use async_graphql::MergedObject;

use crate::gql::domains::bookings::BookingMutation;
use crate::gql::domains::notifications::NotificationMutation;
use crate::gql::domains::payments::PaymentMutation;

#[derive(MergedObject, Default)]
pub struct MutationRoot(BookingMutation, NotificationMutation, PaymentMutation);
