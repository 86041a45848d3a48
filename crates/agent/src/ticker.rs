// Call duration ticker

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::reconciler::Reconciler;

const TICK: Duration = Duration::from_secs(1);

/// Advances the active call's duration once per second
///
/// The reconciler decides whether a tick counts; only CONNECTED calls move.
pub struct DurationTicker {
    reconciler: Reconciler,
    period: Duration,
}

impl DurationTicker {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler,
            period: TICK,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reconciler.tick();
                }
                _ = shutdown.changed() => {
                    debug!("Duration ticker: shutdown requested");
                    break;
                }
            }
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
