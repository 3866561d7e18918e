//! Result aggregation: final item state into result lists, a batch summary and a
//! per-brand breakdown.

use crate::generation::GenerationResult;
use crate::product::ProductRecord;
use crate::queue::{DispatchStats, WorkItem};
use crate::types::ProcessingStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Every row's result, split by outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResults {
    pub successful: Vec<GenerationResult>,
    pub failed: Vec<GenerationResult>,
    pub skipped: Vec<GenerationResult>,
    /// Successful, then failed, then skipped
    pub all: Vec<GenerationResult>,
}

impl BatchResults {
    pub fn add_skipped(&mut self, skipped: impl IntoIterator<Item = GenerationResult>) {
        self.skipped.extend(skipped);
        self.refresh_all();
    }

    /// Rebuild `all` after one of the outcome lists changed.
    pub fn refresh_all(&mut self) {
        self.all = self
            .successful
            .iter()
            .chain(&self.failed)
            .chain(&self.skipped)
            .cloned()
            .collect();
    }

    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len() + self.skipped.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_rows: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_cost: f64,
    /// Wall-clock seconds of the dispatch run
    pub total_time_secs: f64,
    /// Percent of rows that succeeded
    pub success_rate: f64,
}

impl BatchSummary {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Batch summary");
        let _ = writeln!(out, "  Rows:         {}", self.total_rows);
        let _ = writeln!(out, "  Successful:   {}", self.successful);
        let _ = writeln!(out, "  Failed:       {}", self.failed);
        let _ = writeln!(out, "  Skipped:      {}", self.skipped);
        let _ = writeln!(out, "  Success rate: {:.1}%", self.success_rate);
        let _ = writeln!(out, "  Total cost:   ${:.4}", self.total_cost);
        let _ = write!(out, "  Total time:   {:.1}s", self.total_time_secs);
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandBreakdown {
    /// Rows of this brand, skipped ones included
    pub count: usize,
    pub successful: usize,
    pub failed: usize,
    /// Spend on successful results only
    pub cost: f64,
}

pub struct ResultAggregator;

impl ResultAggregator {
    /// Collect results from the dispatcher's terminal collections plus rows skipped before admission.
    ///
    /// Failed items that somehow carry no result get one synthesized from the item, so
    /// every failure still names its product, provider and reason.
    pub fn aggregate(
        completed: &[WorkItem],
        failed: &[WorkItem],
        skipped: &[GenerationResult],
    ) -> BatchResults {
        let successful = completed
            .iter()
            .filter_map(|item| item.result.clone())
            .collect();
        let failed = failed
            .iter()
            .map(|item| {
                item.result.clone().unwrap_or_else(|| {
                    GenerationResult::failure(
                        &item.request.product,
                        item.request.provider,
                        ProcessingStatus::Failed,
                        item.error_message.clone(),
                    )
                })
            })
            .collect();

        let mut results = BatchResults {
            successful,
            failed,
            skipped: skipped.to_vec(),
            all: Vec::new(),
        };
        results.refresh_all();
        results
    }

    pub fn summarize(results: &BatchResults, stats: &DispatchStats) -> BatchSummary {
        let total_rows = results.total();
        let total_time_secs = match (stats.start_time, stats.end_time) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as f64 / 1000.0,
            _ => 0.0,
        };
        let success_rate = if total_rows == 0 {
            0.0
        } else {
            results.successful.len() as f64 / total_rows as f64 * 100.0
        };
        BatchSummary {
            total_rows,
            successful: results.successful.len(),
            failed: results.failed.len(),
            skipped: results.skipped.len(),
            total_cost: results.successful.iter().map(GenerationResult::cost).sum(),
            total_time_secs,
            success_rate,
        }
    }

    pub fn brand_breakdown(results: &BatchResults) -> BTreeMap<String, BrandBreakdown> {
        let mut brands: BTreeMap<String, BrandBreakdown> = BTreeMap::new();
        for result in &results.all {
            let entry = brands.entry(result.brand_name.clone()).or_default();
            entry.count += 1;
            match result.status {
                ProcessingStatus::Success => {
                    entry.successful += 1;
                    entry.cost += result.cost();
                }
                ProcessingStatus::Failed => entry.failed += 1,
                _ => {}
            }
        }
        brands
    }

    /// Result for a row rejected before admission.
    pub fn skipped_result(product: &ProductRecord, reason: impl Into<String>) -> GenerationResult {
        GenerationResult::failure(
            product,
            product.provider,
            ProcessingStatus::Skipped,
            Some(reason.into()),
        )
    }
}
