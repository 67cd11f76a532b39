use async_graphql::MergedObject;

use crate::gql::domains::bookings::BookingQuery;
use crate::gql::domains::notifications::NotificationQuery;

#[derive(MergedObject, Default)]
pub struct QueryRoot(BookingQuery, NotificationQuery);
