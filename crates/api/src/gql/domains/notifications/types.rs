use async_graphql::{Enum, SimpleObject, ID};
use chrono::{DateTime, Utc};

use crate::services::notification_service::Severity;
use infra::models::NotificationRow;

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug)]
#[graphql(remote = "crate::services::notification_service::Severity")]
pub enum NotificationSeverity {
    Info,
    Success,
    Warning,
}

#[derive(SimpleObject, Clone, Debug)]
pub struct UserNotification {
    pub id: ID,
    #[graphql(skip)]
    pub user_id: i64,
    pub message: String,
    pub severity: NotificationSeverity,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<NotificationRow> for UserNotification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: ID::from(row.id.to_string()),
            user_id: row.user_id,
            message: row.message,
            severity: Severity::from(row.severity.as_str()).into(),
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}
