use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::gql::domains::notifications::types::UserNotification;
use crate::gql::subscriptions::publish_user_notification;
use infra::db::Db;
use infra::repos::NotificationRepo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
        }
    }
}

impl From<&str> for Severity {
    fn from(value: &str) -> Self {
        match value {
            "success" => Severity::Success,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// User-facing notification sink. Delivery is best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: i64, message: &str, severity: Severity) -> Result<(), NotifyError>;
}

/// Persists notifications and pushes them to live subscribers.
pub struct DbNotifier {
    repo: NotificationRepo,
}

impl DbNotifier {
    pub fn new(db: Db) -> Self {
        Self {
            repo: NotificationRepo::new(db),
        }
    }
}

#[async_trait]
impl Notifier for DbNotifier {
    async fn notify(&self, user_id: i64, message: &str, severity: Severity) -> Result<(), NotifyError> {
        let row = self.repo.create(user_id, message, severity.as_str()).await?;
        debug!(user_id, notification_id = %row.id, "Notification stored");

        publish_user_notification(UserNotification::from(row));
        Ok(())
    }
}
