use sqlx::PgExecutor;

use crate::models::VenueRow;

pub async fn get_by_id<'e>(
    executor: impl PgExecutor<'e>,
    id: i64,
) -> sqlx::Result<Option<VenueRow>> {
    sqlx::query_as::<_, VenueRow>(
        r#"
        SELECT id, owner_id, name, address, price_per_hour, status
        FROM venues
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}
