use sqlx::{PgPool, Result};
use uuid::Uuid;

use crate::models::NotificationRow;

pub struct NotificationRepo {
    db: PgPool,
}

impl NotificationRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, user_id: i64, message: &str, severity: &str) -> Result<NotificationRow> {
        sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (id, user_id, message, severity)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, message, severity, is_read, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(message)
        .bind(severity)
        .fetch_one(&self.db)
        .await
    }

    pub async fn list_for_user(&self, user_id: i64, unread_only: bool) -> Result<Vec<NotificationRow>> {
        sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, message, severity, is_read, created_at
            FROM notifications
            WHERE user_id = $1 AND ($2 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT 100
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.db)
        .await
    }

    /// Returns false when the notification does not exist or belongs to someone else.
    pub async fn mark_read(&self, id: Uuid, user_id: i64) -> Result<bool> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.db)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
