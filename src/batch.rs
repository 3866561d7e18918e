//! Batch pipeline: product rows → admission → dispatch → aggregation.
//!
//! Rows that fail [`ProductRecord::validate`], or repeat an earlier row's number, never
//! reach the dispatcher; they are reported as skipped so every row ends up in exactly one
//! of successful, failed or skipped.

use crate::aggregate::{BatchResults, BatchSummary, BrandBreakdown, ResultAggregator};
use crate::checkpoint::CheckpointStore;
use crate::config::AdConfig;
use crate::error::ApiError;
use crate::generation::{GenerationRequest, GenerationResult};
use crate::product::ProductRecord;
use crate::provider::ProviderRegistry;
use crate::queue::{
    admission_priority, plan_provider, DispatchOptions, Dispatcher, RestoreSummary,
    StatisticsReport, WorkItem, WorkItemId,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// What a dry run would do with one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedItem {
    pub id: WorkItemId,
    pub product_name: String,
    pub brand_name: String,
    pub priority: u32,
    pub provider: Option<String>,
    pub estimated_cost: Option<f64>,
    pub skip_reason: Option<String>,
}

/// A dispatcher loaded with the admitted rows, plus the rows that were skipped.
pub struct PreparedBatch {
    pub dispatcher: Dispatcher,
    pub skipped: Vec<GenerationResult>,
    pub admitted: Vec<WorkItemId>,
    pub restored: Option<RestoreSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: BatchResults,
    pub summary: BatchSummary,
    pub brands: BTreeMap<String, BrandBreakdown>,
    pub statistics: StatisticsReport,
    /// The run stopped with work still queued
    pub paused: bool,
}

pub struct BatchRunner {
    config: Arc<AdConfig>,
    registry: ProviderRegistry,
}

impl BatchRunner {
    pub fn new(config: Arc<AdConfig>, registry: ProviderRegistry) -> Self {
        Self { config, registry }
    }

    pub fn from_config(config: Arc<AdConfig>) -> Result<Self, ApiError> {
        let registry = ProviderRegistry::from_config(&config)?;
        Ok(Self::new(config, registry))
    }

    pub fn config(&self) -> &AdConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Admission plan without calling providers or reserving rate-limit slots.
    pub fn plan(&self, products: &[ProductRecord]) -> Vec<PlannedItem> {
        let mut seen = HashSet::new();
        products
            .iter()
            .map(|product| {
                let id = WorkItemId::for_row(product.row_number);
                let mut planned = PlannedItem {
                    id,
                    product_name: product.product_name.clone(),
                    brand_name: product.brand_name.clone(),
                    priority: admission_priority(product),
                    provider: None,
                    estimated_cost: None,
                    skip_reason: None,
                };
                if let Err(reason) = check_row(product, &mut seen) {
                    planned.skip_reason = Some(reason);
                    return planned;
                }

                let request = GenerationRequest::from_product(product, &self.config.generation);
                match plan_provider(&self.registry, &request) {
                    Ok(provider) => {
                        planned.provider = Some(provider.kind().to_string());
                        planned.estimated_cost = Some(provider.estimate_cost(&request));
                    }
                    Err(e) => planned.skip_reason = Some(e.to_string()),
                }
                planned
            })
            .collect()
    }

    /// Validate rows, restore any checkpoint, and admit the rest.
    pub fn prepare(&self, products: &[ProductRecord]) -> Result<PreparedBatch, ApiError> {
        if self.registry.is_empty() {
            return Err(ApiError::ProviderNotConfigured(
                "no provider has an API key; run `adbatch validate-config`".to_string(),
            ));
        }

        let options = DispatchOptions {
            concurrency: self.config.dispatch.concurrency,
            max_retries: self.config.dispatch.max_retries,
        };
        let checkpoint = self
            .config
            .dispatch
            .checkpoint_path
            .as_ref()
            .map(CheckpointStore::new);
        let dispatcher = Dispatcher::new(self.registry.clone(), options, checkpoint);
        let restored = dispatcher.restore();

        let mut skipped = Vec::new();
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        for product in products {
            match check_row(product, &mut seen) {
                Ok(()) => items.push(WorkItem::from_product(
                    product,
                    &self.config.generation,
                    options.max_retries,
                )),
                Err(reason) => {
                    warn!(row = product.row_number, reason = %reason, "Skipping product row");
                    skipped.push(ResultAggregator::skipped_result(product, reason));
                }
            }
        }
        let admitted = dispatcher.admit(items);

        info!(
            rows = products.len(),
            admitted = admitted.len(),
            skipped = skipped.len(),
            resumed = restored.is_some(),
            "Batch prepared"
        );
        Ok(PreparedBatch {
            dispatcher,
            skipped,
            admitted,
            restored,
        })
    }

    /// Run the dispatcher and aggregate everything into a report.
    pub async fn execute(&self, prepared: PreparedBatch) -> BatchReport {
        let PreparedBatch {
            dispatcher,
            skipped,
            ..
        } = prepared;

        let mut results = dispatcher.run().await;
        results.add_skipped(skipped);

        let statistics = dispatcher.statistics();
        let status = dispatcher.queue_status();
        let summary = ResultAggregator::summarize(&results, &statistics.stats);
        let brands = ResultAggregator::brand_breakdown(&results);
        BatchReport {
            results,
            summary,
            brands,
            statistics,
            paused: status.pending > 0,
        }
    }
}

/// Row validation plus a guard against two rows claiming the same row number.
fn check_row(product: &ProductRecord, seen: &mut HashSet<u32>) -> Result<(), String> {
    product.validate()?;
    if !seen.insert(product.row_number) {
        return Err(format!("Duplicate row number {}", product.row_number));
    }
    Ok(())
}
