use async_graphql::{Context, Error, Result};

use crate::auth::Claims;
use crate::booking::{Actor, Role};

/// Resolve the authenticated caller from the JWT claims in the context.
pub fn require_actor(ctx: &Context<'_>) -> Result<Actor> {
    let claims = ctx
        .data::<Claims>()
        .map_err(|_| Error::new("You must be logged in to perform this action"))?;

    actor_from_claims(claims)
}

pub fn actor_from_claims(claims: &Claims) -> Result<Actor> {
    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| Error::new("Invalid user ID in token"))?;
    let role: Role = claims.role.parse().map_err(Error::new)?;

    Ok(Actor::new(user_id, role))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, role: &str) -> Claims {
        Claims {
            sub: sub.to_string(),
            email: "someone@example.com".to_string(),
            role: role.to_string(),
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn maps_claims_to_actor() {
        let actor = actor_from_claims(&claims("17", "admin")).unwrap();
        assert_eq!(actor, Actor::admin(17));
    }

    #[test]
    fn rejects_malformed_claims() {
        assert!(actor_from_claims(&claims("not-a-number", "player")).is_err());
        assert!(actor_from_claims(&claims("3", "superuser")).is_err());
    }
}
