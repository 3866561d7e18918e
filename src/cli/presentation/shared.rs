//! Shared presentation: JSON helper, config validation and checkpoint summaries.

use crate::checkpoint::Checkpoint;
use crate::config::{ConfigWarning, ValidationError};
use crate::error::{ApiError, StorageError};
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;
use std::path::Path;

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::Serialization(e)))
}

pub fn format_validation_result(
    result: &Result<Vec<ConfigWarning>, Vec<ValidationError>>,
) -> String {
    match result {
        Ok(warnings) if warnings.is_empty() => {
            format!("{} Configuration is valid", "✓".green())
        }
        Ok(warnings) => {
            let mut s = format!(
                "{} Configuration is valid with warnings ({}):",
                "✓".green(),
                warnings.len()
            );
            for w in warnings {
                s.push_str(&format!("\n  {} {}", "!".yellow(), w));
            }
            s
        }
        Err(errors) => {
            let mut s = format!(
                "{} Configuration is invalid ({} error(s)):",
                "✗".red(),
                errors.len()
            );
            for e in errors {
                s.push_str(&format!("\n  - {}", e));
            }
            s
        }
    }
}

pub fn format_checkpoint_summary(
    path: &Path,
    checkpoint: &Checkpoint,
    format: &str,
) -> Result<String, ApiError> {
    let stats = &checkpoint.stats;
    if format == "json" {
        let out = json!({
            "path": path.display().to_string(),
            "format": checkpoint.format,
            "version": checkpoint.version,
            "revision": checkpoint.revision,
            "saved_at": checkpoint.saved_at,
            "queue": checkpoint.queue.len(),
            "in_flight": checkpoint.in_flight.len(),
            "completed": checkpoint.completed.len(),
            "failed": checkpoint.failed.len(),
            "stats": stats,
        });
        return to_json(&out);
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Collection", "Items"]);
    table.add_row(vec!["queue".to_string(), checkpoint.queue.len().to_string()]);
    table.add_row(vec![
        "in flight".to_string(),
        checkpoint.in_flight.len().to_string(),
    ]);
    table.add_row(vec![
        "completed".to_string(),
        checkpoint.completed.len().to_string(),
    ]);
    table.add_row(vec!["failed".to_string(), checkpoint.failed.len().to_string()]);

    Ok(format!(
        "{}\n  Path: {}\n  Revision: {} (saved {})\n\n{}\n\n  Processed: {}/{}  Success: {}  Failed: {}  Retries: {}  Cost: ${:.4}",
        "Checkpoint".bold().underline(),
        path.display(),
        checkpoint.revision,
        checkpoint.saved_at.to_rfc3339(),
        table,
        stats.processed,
        stats.total,
        stats.success,
        stats.failed,
        stats.retries,
        stats.total_cost
    ))
}
