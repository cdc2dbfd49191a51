//! Fire-and-forget analytics.
//!
//! Events are queued on a bounded channel and forwarded to the runtime by a single worker
//! task. Callers never wait for delivery and never see its errors.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    runtime::{AnalyticsEvent, RuntimeVerifier},
    utils::now_millis,
};

/// Default queue capacity.
pub const DEFAULT_ANALYTICS_CAPACITY: usize = 256;

/// Emitted after a successful login.
pub const EVENT_SESSION_CREATED: &str = "session_created";
/// Emitted after a successful verification.
pub const EVENT_SESSION_VERIFIED: &str = "session_verified";
/// Emitted after a revocation.
pub const EVENT_SESSION_REVOKED: &str = "session_revoked";

/// Handle to the analytics queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AnalyticsDispatcher {
    sender: mpsc::Sender<AnalyticsEvent>,
}

impl AnalyticsDispatcher {
    /// Spawns the delivery worker on the current tokio runtime.
    ///
    /// The worker stops once every dispatcher clone is dropped and the queue is drained.
    #[must_use]
    pub fn spawn(
        runtime: Arc<dyn RuntimeVerifier>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<AnalyticsEvent>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                runtime.record_analytics(&event).await;
            }
            debug!("analytics: queue closed");
        });
        (Self { sender }, worker)
    }

    /// Queues an event. Drops it with a warning when the queue is full or closed.
    pub fn dispatch(&self, app_id: &str, event: &str, metadata: Option<Value>) {
        let event = AnalyticsEvent {
            app_id: app_id.to_string(),
            event: event.to_string(),
            metadata,
            timestamp: now_millis(),
        };
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = %event.event, "analytics: queue full, event dropped");
            }
            Err(TrySendError::Closed(event)) => {
                warn!(event = %event.event, "analytics: worker gone, event dropped");
            }
        }
    }
}
