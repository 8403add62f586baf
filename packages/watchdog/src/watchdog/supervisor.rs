//! Supervision loop: periodic, non-overlapping driver of the stuck detector.

use std::time::Duration;

use sqlx::PgPool;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::WatchdogConfig;
use crate::watchdog::detector::StuckDetector;

pub struct Supervisor {
    detector: StuckDetector,
    check_interval: Duration,
}

impl Supervisor {
    pub fn new(pool: PgPool, config: WatchdogConfig) -> Self {
        let check_interval = config.check_interval;
        Self {
            detector: StuckDetector::new(pool, config),
            check_interval,
        }
    }

    /// Run the loop until `shutdown` is cancelled.
    ///
    /// The scan runs inline in this task, so a tick that is still scanning
    /// suppresses the next scheduled tick instead of stacking. An in-flight
    /// scan is allowed to finish before the loop exits.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            check_interval_secs = self.check_interval.as_secs(),
            "supervision loop starting"
        );

        let mut interval = tokio::time::interval(self.check_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let newly_stuck = self.detector.scan().await;
                    debug!(newly_stuck = newly_stuck.len(), "detector tick finished");
                }
            }
        }

        info!("supervision loop stopped");
    }
}
