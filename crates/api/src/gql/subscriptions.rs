use async_graphql::{Context, Result, Subscription};
use futures_util::Stream;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::auth::permissions::require_actor;
use crate::gql::domains::notifications::types::UserNotification;

const CHANNEL_CAPACITY: usize = 100;

/// Per-user notification channels.
struct SubscriptionChannels {
    users: HashMap<i64, broadcast::Sender<UserNotification>>,
}

impl SubscriptionChannels {
    fn new() -> Self {
        Self {
            users: HashMap::new(),
        }
    }

    fn get_or_create_user(&mut self, user_id: i64) -> &broadcast::Sender<UserNotification> {
        self.users
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
    }

    /// Drop channels nobody listens to any more.
    fn prune(&mut self) {
        self.users.retain(|_, sender| sender.receiver_count() > 0);
    }
}

static CHANNELS: Lazy<Arc<Mutex<SubscriptionChannels>>> =
    Lazy::new(|| Arc::new(Mutex::new(SubscriptionChannels::new())));

pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Live booking notifications for the authenticated user.
    async fn user_notifications(
        &self,
        ctx: &Context<'_>,
    ) -> Result<impl Stream<Item = Result<UserNotification, BroadcastStreamRecvError>>> {
        let actor = require_actor(ctx)?;

        let receiver = {
            let mut channels = CHANNELS.lock();
            channels.get_or_create_user(actor.user_id).subscribe()
        };

        Ok(BroadcastStream::new(receiver))
    }
}

/// Publish a notification to a specific user's channel.
pub fn publish_user_notification(notification: UserNotification) {
    let mut channels = CHANNELS.lock();
    let sender = channels.get_or_create_user(notification.user_id);
    if sender.send(notification).is_err() {
        channels.prune();
    }
}
