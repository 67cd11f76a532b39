use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{error, info};

use infra::store::{BookingStore, StoreResult};

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    /// Unpaid bookings older than this are canceled.
    pub pending_ttl: chrono::Duration,
    /// Canceled bookings older than this are deleted. `None` disables purging.
    pub purge_canceled_after: Option<chrono::Duration>,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            pending_ttl: chrono::Duration::minutes(10),
            purge_canceled_after: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: u64,
    pub purged: u64,
}

/// Periodically releases slots held by unpaid bookings.
pub struct ExpirySweeper {
    store: Arc<dyn BookingStore>,
    config: SweeperConfig,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn BookingStore>, config: SweeperConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            pending_ttl_mins = self.config.pending_ttl.num_minutes(),
            "Starting expiry sweeper"
        );

        let mut ticker: Interval = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.sweep_at(Utc::now()).await {
                Ok(report) if report.expired > 0 || report.purged > 0 => {
                    info!(
                        expired = report.expired,
                        purged = report.purged,
                        "Cleaned up stale bookings"
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Error sweeping stale bookings: {}", e),
            }
        }
    }

    /// One pass as of `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> StoreResult<SweepReport> {
        let expired = self
            .store
            .expire_pending(now - self.config.pending_ttl)
            .await?;

        let purged = match self.config.purge_canceled_after {
            Some(age) => self.store.purge_canceled(now - age).await?,
            None => 0,
        };

        Ok(SweepReport { expired, purged })
    }
}

/// Spawn the sweeper as a background task.
pub fn spawn_sweeper(store: Arc<dyn BookingStore>, config: SweeperConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let sweeper = ExpirySweeper::new(store, config);
        sweeper.run().await;
    })
}
