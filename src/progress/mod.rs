//! Progress reporting.
//!
//! The dispatcher hands a [`ProgressSnapshot`] to the configured sink after every item
//! transition. Sinks run on the worker that made the transition, so they must return quickly.

use crate::queue::ProgressSnapshot;
use tokio::sync::mpsc;
use tracing::info;

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Logs each snapshot as a structured `info` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        info!(
            total = snapshot.total,
            processed = snapshot.processed,
            in_progress = snapshot.in_progress,
            pending = snapshot.pending,
            success = snapshot.success,
            failed = snapshot.failed,
            retries = snapshot.retries,
            completion_percentage = snapshot.completion_percentage,
            total_cost = snapshot.total_cost,
            "Batch progress"
        );
    }
}

/// Forwards snapshots to an unbounded channel; a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressSnapshot>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let _ = self.tx.send(snapshot.clone());
    }
}
