//! Periodic, read-only polling of the runtime's health and version endpoints.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::{runtime::RuntimeVerifier, utils::now_millis};

/// Default polling interval.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Latest known runtime status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    /// Whether the last health check succeeded.
    pub online: bool,
    /// Version reported by the runtime.
    pub version: Option<String>,
    /// Runtime mode (`mock` or `live`).
    pub mode: &'static str,
    /// Time of the last check in unix milliseconds, zero before the first one.
    pub checked_at: u64,
}

/// Polls the runtime on a fixed interval and publishes [`RuntimeStatus`] snapshots.
#[derive(Debug)]
pub struct HealthMonitor {
    status: watch::Receiver<RuntimeStatus>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Starts polling. The first check runs immediately; missed ticks are skipped.
    #[must_use]
    pub fn spawn(runtime: Arc<dyn RuntimeVerifier>, interval: Duration) -> Self {
        let (sender, status) = watch::channel(RuntimeStatus {
            mode: runtime.mode(),
            ..RuntimeStatus::default()
        });

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let (online, version) = tokio::join!(runtime.health(), runtime.version());
                let snapshot = RuntimeStatus {
                    online,
                    version,
                    mode: runtime.mode(),
                    checked_at: now_millis(),
                };

                let previous = sender.borrow().online;
                if previous != snapshot.online || sender.borrow().checked_at == 0 {
                    if snapshot.online {
                        info!(version = ?snapshot.version, "runtime online");
                    } else {
                        warn!("runtime offline");
                    }
                }
                if sender.send(snapshot).is_err() {
                    break;
                }
            }
        });

        Self { status, task }
    }

    /// Latest snapshot.
    #[must_use]
    pub fn status(&self) -> RuntimeStatus {
        self.status.borrow().clone()
    }

    /// A receiver that observes every new snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RuntimeStatus> {
        self.status.clone()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}
