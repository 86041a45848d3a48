// Connectivity monitor
//
// Calls the platform's `version` function on a fixed interval and publishes the
// result on a watch channel. The reconciler refuses actions unless the last check
// succeeded. This is the only component that repeats a remote call on its own.

use std::sync::Arc;
use std::time::Duration;

use leadline_core::{Connectivity, ControlError, Result};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::ControlApi;

struct MonitorInner {
    api: ControlApi,
    interval: Duration,
    state: watch::Sender<Connectivity>,
    version: Mutex<Option<String>>,
}

/// Periodic reachability check
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("interval", &self.inner.interval)
            .finish_non_exhaustive()
    }
}

impl ConnectivityMonitor {
    pub fn new(api: ControlApi, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(ControlError::config(
                "connectivity interval must be at least 1 second",
            ));
        }
        let (state, _) = watch::channel(Connectivity::Unknown);
        Ok(Self {
            inner: Arc::new(MonitorInner {
                api,
                interval,
                state,
                version: Mutex::new(None),
            }),
        })
    }

    /// Receiver handed to the reconciler and the presentation layer
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.inner.state.subscribe()
    }

    pub fn current(&self) -> Connectivity {
        self.inner.state.borrow().clone()
    }

    /// Version reported by the last successful check
    pub fn platform_version(&self) -> Option<String> {
        self.inner.version.lock().clone()
    }

    /// Run one check and publish its outcome
    pub async fn check_once(&self) -> Connectivity {
        let next = match self.inner.api.version().await {
            Ok(version) => {
                *self.inner.version.lock() = Some(version);
                Connectivity::Connected
            }
            Err(e) => Connectivity::Disconnected(e.to_string()),
        };

        let previous = self.inner.state.send_replace(next.clone());
        match (previous.is_connected(), next.is_connected()) {
            (false, true) => info!(
                version = self.platform_version().as_deref().unwrap_or("unknown"),
                "platform reachable"
            ),
            (true, false) | (false, false) if previous != next => {
                if let Connectivity::Disconnected(reason) = &next {
                    warn!(%reason, "platform unreachable");
                }
            }
            _ => debug!(state = %next, "connectivity unchanged"),
        }
        next
    }

    /// Check now, then on every interval until `shutdown` flips
    ///
    /// A check still waiting on the platform is abandoned at shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.inner.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    debug!("Connectivity monitor: shutdown requested");
                    break;
                }
            }
            tokio::select! {
                _ = self.check_once() => {}
                _ = shutdown.changed() => {
                    debug!("Connectivity monitor: shutdown during check");
                    break;
                }
            }
        }

        debug!("Connectivity monitor exited");
    }

    pub fn spawn(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move { monitor.run(shutdown).await })
    }
}
