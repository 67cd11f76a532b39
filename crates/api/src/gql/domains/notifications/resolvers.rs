use async_graphql::{Context, Object, Result, ID};
use uuid::Uuid;

use super::types::UserNotification;
use crate::auth::permissions::require_actor;
use crate::gql::error::GqlError;
use crate::state::AppState;
use infra::repos::NotificationRepo;

#[derive(Default)]
pub struct NotificationQuery;

#[Object]
impl NotificationQuery {
    /// Latest notifications for the caller
    async fn my_notifications(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = false)] unread_only: bool,
    ) -> Result<Vec<UserNotification>> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;

        let rows = NotificationRepo::new(state.db.clone())
            .list_for_user(actor.user_id, unread_only)
            .await
            .map_err(GqlError::from)?;

        Ok(rows.into_iter().map(UserNotification::from).collect())
    }
}

#[derive(Default)]
pub struct NotificationMutation;

#[Object]
impl NotificationMutation {
    /// Returns false when the notification does not belong to the caller
    async fn mark_notification_read(&self, ctx: &Context<'_>, id: ID) -> Result<bool> {
        let state = ctx.data::<AppState>()?;
        let actor = require_actor(ctx)?;
        let id = Uuid::parse_str(id.as_str()).map_err(GqlError::from)?;

        let updated = NotificationRepo::new(state.db.clone())
            .mark_read(id, actor.user_id)
            .await
            .map_err(GqlError::from)?;

        Ok(updated)
    }
}
