//! Work Dispatch Queue
//!
//! Priority-ordered work items, provider selection with fallback, and the bounded
//! worker pool that drives every item to a terminal state.

pub mod dispatcher;
pub mod item;
pub mod priority;
pub mod selection;
pub mod stats;

pub use dispatcher::{DispatchOptions, Dispatcher, PauseHandle, RestoreSummary};
pub use item::{admission_priority, FailureOutcome, WorkItem, WorkItemId};
pub use priority::PriorityQueue;
pub use selection::{plan_provider, select_provider};
pub use stats::{DispatchStats, ProgressSnapshot, QueueStatus, StatisticsReport};
