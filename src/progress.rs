//! Progress delivery
//!
//! Sinks are fire-and-forget: a slow or broken consumer must never stall a
//! job, so `emit` is synchronous and infallible from the pipeline's point
//! of view.

use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::info;

use crate::models::job::{ProgressEvent, ProgressKind};

/// Receives progress events from running jobs
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Logs every event through tracing
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: ProgressEvent) {
        match &event.kind {
            ProgressKind::StageStarted { stage, message } => {
                info!("[{}] ▶ {}: {}", event.job_id, stage, message);
            }
            ProgressKind::SubStep {
                stage,
                current,
                total,
                message,
            } => {
                info!(
                    "[{}]   {} {}/{}: {}",
                    event.job_id, stage, current, total, message
                );
            }
            ProgressKind::Finished { status, message } => {
                info!("[{}] ■ {}: {}", event.job_id, status, message);
            }
        }
    }
}

/// Fans events out to any number of subscribers over a broadcast channel
pub struct BroadcastSink {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressSink for BroadcastSink {
    fn emit(&self, event: ProgressEvent) {
        // no subscribers is fine
        let _ = self.sender.send(event);
    }
}

/// Collects events in memory; for tests and batch summaries
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
