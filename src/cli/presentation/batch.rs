//! Batch presentation: dry-run plan and run report.

use super::shared::to_json;
use crate::batch::{BatchReport, PlannedItem};
use crate::error::ApiError;
use crate::types::ProcessingStatus;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::Path;

pub fn format_plan(plan: &[PlannedItem], format: &str) -> Result<String, ApiError> {
    let admitted = plan.iter().filter(|p| p.skip_reason.is_none()).count();
    let estimated: f64 = plan.iter().filter_map(|p| p.estimated_cost).sum();

    if format == "json" {
        return to_json(&json!({
            "items": plan,
            "admitted": admitted,
            "skipped": plan.len() - admitted,
            "estimated_cost": estimated,
        }));
    }

    let mut ordered: Vec<&PlannedItem> = plan.iter().collect();
    ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Item", "Product", "Brand", "Priority", "Provider", "Est. cost"]);
    for item in ordered {
        let (provider, cost) = match &item.skip_reason {
            Some(reason) => (format!("{} {}", "skip:".yellow(), reason), "-".to_string()),
            None => (
                item.provider.clone().unwrap_or_default(),
                item.estimated_cost
                    .map(|c| format!("${:.4}", c))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        };
        table.add_row(vec![
            item.id.to_string(),
            item.product_name.clone(),
            item.brand_name.clone(),
            item.priority.to_string(),
            provider,
            cost,
        ]);
    }

    Ok(format!(
        "{}\n\n{}\n\nWould dispatch {} of {} row(s), estimated cost ${:.4}",
        "Dry run".bold().underline(),
        table,
        admitted,
        plan.len(),
        estimated
    ))
}

pub fn format_report(
    report: &BatchReport,
    output_root: &Path,
    format: &str,
) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(&json!({
            "summary": report.summary,
            "brands": report.brands,
            "statistics": report.statistics,
            "paused": report.paused,
            "output_dir": output_root.display().to_string(),
            "results": report.results.all,
        }));
    }

    let mut out = report.summary.render();

    if !report.brands.is_empty() {
        let mut table = Table::new();
        table.load_preset(comfy_table::presets::UTF8_FULL);
        table.set_header(vec!["Brand", "Rows", "Successful", "Failed", "Cost"]);
        for (brand, b) in &report.brands {
            table.add_row(vec![
                brand.clone(),
                b.count.to_string(),
                b.successful.to_string(),
                b.failed.to_string(),
                format!("${:.4}", b.cost),
            ]);
        }
        out.push_str(&format!("\n\n{}", table));
    }

    let problems: Vec<_> = report
        .results
        .all
        .iter()
        .filter(|r| r.status != ProcessingStatus::Success)
        .collect();
    if !problems.is_empty() {
        out.push_str(&format!("\n\n{}", "Not generated:".bold()));
        for r in problems {
            let status = match r.status {
                ProcessingStatus::Failed => r.status.as_str().red().to_string(),
                _ => r.status.as_str().yellow().to_string(),
            };
            out.push_str(&format!(
                "\n  [{}] {} / {}: {}",
                status,
                r.brand_name,
                r.product_name,
                r.error_message.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    if report.paused {
        out.push_str(&format!(
            "\n\n{} Run paused with {} item(s) queued; rerun with the same checkpoint to resume.",
            "!".yellow(),
            report
                .statistics
                .stats
                .total
                .saturating_sub(report.statistics.stats.processed)
        ));
    }
    out.push_str(&format!("\n\nOutput: {}", output_root.display()));
    Ok(out)
}
