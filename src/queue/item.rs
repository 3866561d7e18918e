//! Work item model and admission priority.

use crate::generation::{GenerationDefaults, GenerationRequest, GenerationResult};
use crate::product::ProductRecord;
use crate::types::ProcessingStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const BASE_PRIORITY: u32 = 100;
pub const COST_CEILING_BONUS: u32 = 20;
pub const REFERENCE_IMAGE_BONUS: u32 = 5;
pub const OVERLAY_PENALTY: u32 = 10;
pub const PROVIDER_HINT_BONUS: u32 = 15;

/// Stable item identity, derived from the feed row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(String);

impl WorkItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn for_row(row_number: u32) -> Self {
        Self(format!("product_{}", row_number))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Admission priority: cost-ceiling and reference-heavy rows first, overlay rows later.
pub fn admission_priority(product: &ProductRecord) -> u32 {
    let mut priority = BASE_PRIORITY;
    if product.max_cost.is_some() {
        priority += COST_CEILING_BONUS;
    }
    priority += REFERENCE_IMAGE_BONUS * product.reference_images().len() as u32;
    if product.provider.is_some() {
        priority += PROVIDER_HINT_BONUS;
    }
    if product.add_product_overlay {
        priority = priority.saturating_sub(OVERLAY_PENALTY);
    }
    priority
}

/// What the failure policy decided for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Back to Pending with one less priority
    Requeued,
    /// Retry budget spent; terminal Failed
    Exhausted,
}

/// One product's generation task and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub request: GenerationRequest,
    pub priority: u32,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    /// Admission order, the last tie-break between equal priorities
    #[serde(default)]
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// End of the latest attempt
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: ProcessingStatus,
    #[serde(default)]
    pub result: Option<GenerationResult>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl WorkItem {
    pub fn new(id: WorkItemId, request: GenerationRequest, priority: u32, max_retries: u32) -> Self {
        Self {
            id,
            request,
            priority,
            retry_count: 0,
            max_retries,
            sequence: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            status: ProcessingStatus::Pending,
            result: None,
            error_message: None,
        }
    }

    pub fn from_product(
        product: &ProductRecord,
        defaults: &GenerationDefaults,
        max_retries: u32,
    ) -> Self {
        Self::new(
            WorkItemId::for_row(product.row_number),
            GenerationRequest::from_product(product, defaults),
            admission_priority(product),
            max_retries,
        )
    }

    pub fn brand(&self) -> &str {
        &self.request.product.brand_name
    }

    /// Generation attempts made so far, including one in progress.
    pub fn attempts(&self) -> u32 {
        match self.status {
            ProcessingStatus::InProgress => self.retry_count + 1,
            _ => self.retry_count + u32::from(self.status == ProcessingStatus::Success),
        }
    }

    pub fn mark_in_progress(&mut self) {
        self.status = ProcessingStatus::InProgress;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_success(&mut self, result: GenerationResult) {
        self.status = ProcessingStatus::Success;
        self.completed_at = Some(Utc::now());
        self.error_message = None;
        self.result = Some(result);
    }

    /// Count a failed attempt and decide between retry and terminal failure.
    pub fn record_failure(&mut self, message: String) -> FailureOutcome {
        self.retry_count += 1;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(message);

        if self.retry_count < self.max_retries {
            self.status = ProcessingStatus::Pending;
            self.started_at = None;
            self.priority = self.priority.saturating_sub(1);
            FailureOutcome::Requeued
        } else {
            self.status = ProcessingStatus::Failed;
            self.result = Some(GenerationResult::failure(
                &self.request.product,
                self.request.provider,
                ProcessingStatus::Failed,
                self.error_message.clone(),
            ));
            FailureOutcome::Exhausted
        }
    }

    /// Return an interrupted item to the queue without spending a retry.
    pub fn reset_to_pending(&mut self) {
        self.status = ProcessingStatus::Pending;
        self.started_at = None;
    }
}
