use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info, warn};

pub type Db = PgPool;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub url: String,
    pub max_connections: u32,
    pub max_attempts: u32,
}

/// Open the connection pool, retrying with exponential backoff.
///
/// Gives up after `max_attempts` and returns the last connection error; the
/// caller treats that as fatal.
pub async fn connect_with_retry(settings: &ConnectSettings) -> Result<Db, sqlx::Error> {
    let max_attempts = settings.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        info!(attempt, max_attempts, "Connecting to Postgres");

        let result = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Some(Duration::from_secs(600))) // 10 minutes
            .max_lifetime(Some(Duration::from_secs(1800))) // 30 minutes
            .connect(&settings.url)
            .await;

        match result {
            Ok(pool) => {
                info!(
                    "Connected to Postgres with max {} connections",
                    settings.max_connections
                );
                return Ok(pool);
            }
            Err(e) if attempt >= max_attempts => {
                error!(attempt, "Giving up on Postgres: {}", e);
                return Err(e);
            }
            Err(e) => {
                let wait = backoff_delay(attempt);
                warn!(
                    attempt,
                    "Database not ready ({}), retrying in {:?}",
                    e, wait
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}

/// 1s, 2s, 4s, ... capped at 30s.
pub fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    Duration::from_secs(1u64 << exp).min(MAX_BACKOFF)
}
