use async_trait::async_trait;
use sqlx::PgExecutor;

use crate::db::Db;
use crate::models::{UserContactRow, VenueRow};
use crate::repos::venues;
use crate::store::{Directory, StoreResult};

pub async fn get_contact<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
) -> sqlx::Result<Option<UserContactRow>> {
    sqlx::query_as::<_, UserContactRow>(
        "SELECT id, email, first_name, last_name FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Read-only lookups of venues and user contact details.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    db: Db,
}

impl PgDirectory {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn venue(&self, venue_id: i64) -> StoreResult<Option<VenueRow>> {
        Ok(venues::get_by_id(&self.db, venue_id).await?)
    }

    async fn contact(&self, user_id: i64) -> StoreResult<Option<UserContactRow>> {
        Ok(get_contact(&self.db, user_id).await?)
    }
}
