//! Dispatcher counters and the views derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic run counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchStats {
    /// Items admitted
    pub total: usize,
    /// Items in a terminal state
    pub processed: usize,
    pub success: usize,
    pub failed: usize,
    /// Re-queues after a failed attempt
    pub retries: usize,
    pub total_cost: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl DispatchStats {
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        match self.start_time {
            Some(start) => {
                let end = self.end_time.unwrap_or(now);
                (end - start).num_milliseconds().max(0) as f64 / 1000.0
            }
            None => 0.0,
        }
    }

    /// Rates and ETA as of `now`.
    pub fn report(&self, now: DateTime<Utc>) -> StatisticsReport {
        let elapsed = self.elapsed_secs(now);
        let items_per_minute = if elapsed > 0.0 {
            self.processed as f64 / (elapsed / 60.0)
        } else {
            0.0
        };
        let remaining = self.total.saturating_sub(self.processed);
        let eta_secs = if remaining == 0 {
            Some(0.0)
        } else if items_per_minute > 0.0 {
            Some(remaining as f64 / items_per_minute * 60.0)
        } else {
            None
        };
        StatisticsReport {
            stats: self.clone(),
            elapsed_secs: elapsed,
            items_per_minute,
            eta_secs,
            completion_percentage: self.completion_percentage(),
        }
    }
}

/// Emitted after every item transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
    pub in_progress: usize,
    pub pending: usize,
    pub success: usize,
    pub failed: usize,
    pub retries: usize,
    pub completion_percentage: f64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    #[serde(flatten)]
    pub stats: DispatchStats,
    pub elapsed_secs: f64,
    pub items_per_minute: f64,
    /// Unknown until at least one item has finished
    pub eta_secs: Option<f64>,
    pub completion_percentage: f64,
}

/// Collection sizes at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
    /// Highest simultaneous in-flight count seen this run
    pub peak_in_flight: usize,
    pub paused: bool,
}
