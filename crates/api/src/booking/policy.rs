use std::str::FromStr;

use infra::models::{BookingRow, VenueRow};
use infra::store::Guard;

use super::error::BookingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Player,
    Owner,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" | "user" => Ok(Role::Player),
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn player(user_id: i64) -> Self {
        Self::new(user_id, Role::Player)
    }

    pub fn owner(user_id: i64) -> Self {
        Self::new(user_id, Role::Owner)
    }

    pub fn admin(user_id: i64) -> Self {
        Self::new(user_id, Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Pay,
    Cancel,
    RequestRefund,
    ManageAttendance,
    DecideRefund,
}

impl Action {
    fn holder_only(&self) -> bool {
        matches!(self, Action::Pay | Action::Cancel | Action::RequestRefund)
    }
}

/// Decide which row guard an action runs under.
///
/// Holder actions require the booking to belong to the actor. Venue actions
/// are open to admins outright and to owners through a venue-ownership guard
/// that the store re-checks atomically.
pub fn authorize(actor: &Actor, booking: &BookingRow, action: Action) -> Result<Guard, BookingError> {
    if action.holder_only() {
        return if booking.user_id == actor.user_id {
            Ok(Guard::Owner(actor.user_id))
        } else {
            Err(BookingError::Forbidden("you do not own this booking"))
        };
    }

    match (action, actor.role) {
        (_, Role::Admin) => Ok(Guard::Any),
        (Action::View, _) if booking.user_id == actor.user_id => Ok(Guard::Owner(actor.user_id)),
        (_, Role::Owner) => Ok(Guard::VenueOwner(actor.user_id)),
        _ => Err(BookingError::Forbidden(
            "only venue owners and admins can perform this action",
        )),
    }
}

/// Resolve a guard against a known booking and its venue.
pub fn guard_admits(guard: Guard, booking: &BookingRow, venue: Option<&VenueRow>) -> bool {
    match guard {
        Guard::Any => true,
        Guard::Owner(user_id) => booking.user_id == user_id,
        Guard::VenueOwner(owner_id) => venue.is_some_and(|v| v.owner_id == owner_id),
    }
}

/// Owners manage their own venues; admins manage all of them.
pub fn authorize_venue(actor: &Actor, venue: &VenueRow) -> Result<(), BookingError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Owner if venue.owner_id == actor.user_id => Ok(()),
        Role::Owner => Err(BookingError::Forbidden("you do not own this venue")),
        Role::Player => Err(BookingError::Forbidden(
            "only venue owners and admins can perform this action",
        )),
    }
}

pub fn authorize_admin(actor: &Actor) -> Result<(), BookingError> {
    match actor.role {
        Role::Admin => Ok(()),
        _ => Err(BookingError::Forbidden("only admins can perform this action")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use infra::repos::BookingStatus;
    use infra::Money;

    fn booking(user_id: i64) -> BookingRow {
        let start = Utc::now() + Duration::days(1);
        BookingRow {
            id: 1,
            user_id,
            venue_id: 10,
            start_time: start,
            end_time: start + Duration::hours(1),
            total_price: Money::from_major(500),
            status: BookingStatus::Confirmed,
            order_reference: Some("order_1".into()),
            payment_reference: Some("pay_1".into()),
            created_at: Utc::now(),
        }
    }

    fn venue(owner_id: i64) -> VenueRow {
        VenueRow {
            id: 10,
            owner_id,
            name: "Court".into(),
            address: "Somewhere".into(),
            price_per_hour: Money::from_major(500),
            status: "approved".into(),
        }
    }

    #[test]
    fn holder_actions_require_ownership() {
        let row = booking(7);
        assert_eq!(
            authorize(&Actor::player(7), &row, Action::Cancel).unwrap(),
            Guard::Owner(7)
        );
        assert!(authorize(&Actor::player(8), &row, Action::Cancel).is_err());
        assert!(authorize(&Actor::admin(1), &row, Action::Pay).is_err());
    }

    #[test]
    fn venue_actions_by_role() {
        let row = booking(7);
        assert_eq!(
            authorize(&Actor::admin(1), &row, Action::ManageAttendance).unwrap(),
            Guard::Any
        );
        assert_eq!(
            authorize(&Actor::owner(3), &row, Action::DecideRefund).unwrap(),
            Guard::VenueOwner(3)
        );
        assert!(matches!(
            authorize(&Actor::player(7), &row, Action::ManageAttendance),
            Err(BookingError::Forbidden(_))
        ));
    }

    #[test]
    fn viewing_is_open_to_holder_owner_and_admin() {
        let row = booking(7);
        let own_venue = venue(3);

        let guard = authorize(&Actor::player(7), &row, Action::View).unwrap();
        assert!(guard_admits(guard, &row, Some(&own_venue)));

        let guard = authorize(&Actor::owner(3), &row, Action::View).unwrap();
        assert!(guard_admits(guard, &row, Some(&own_venue)));

        let guard = authorize(&Actor::owner(4), &row, Action::View).unwrap();
        assert!(!guard_admits(guard, &row, Some(&own_venue)));

        assert!(authorize(&Actor::player(8), &row, Action::View).is_err());
    }

    #[test]
    fn venue_management() {
        let v = venue(3);
        assert!(authorize_venue(&Actor::owner(3), &v).is_ok());
        assert!(authorize_venue(&Actor::owner(4), &v).is_err());
        assert!(authorize_venue(&Actor::admin(1), &v).is_ok());
        assert!(authorize_venue(&Actor::player(3), &v).is_err());
    }

    #[test]
    fn admin_only_actions() {
        assert!(authorize_admin(&Actor::admin(1)).is_ok());
        assert!(authorize_admin(&Actor::owner(3)).is_err());
        assert!(authorize_admin(&Actor::player(3)).is_err());
    }

    #[test]
    fn roles_parse_from_claims() {
        assert_eq!("owner".parse::<Role>(), Ok(Role::Owner));
        assert_eq!("user".parse::<Role>(), Ok(Role::Player));
        assert!("root".parse::<Role>().is_err());
    }
}
