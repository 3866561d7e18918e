//! adbatch: batch product advertisement image generation
//!
//! Product rows become prioritized work items that a bounded worker pool dispatches to
//! pluggable image providers, with provider fallback, per-item retry, checkpointed
//! resume and cost accounting.

pub mod aggregate;
pub mod batch;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod generation;
pub mod logging;
pub mod output;
pub mod product;
pub mod progress;
pub mod provider;
pub mod queue;
pub mod types;
