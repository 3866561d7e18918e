//! JSON product feed.
//!
//! The feed is a JSON array of product rows. Missing required strings are tolerated here
//! and caught by [`ProductRecord::validate`] so the row can be reported as skipped; rows
//! with wrongly typed fields make the whole feed invalid.

use crate::error::ApiError;
use crate::product::ProductRecord;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Row number of the first data row, below the spreadsheet header.
const FIRST_DATA_ROW: u32 = 2;

pub fn load_products(path: &Path) -> Result<Vec<ProductRecord>, ApiError> {
    let invalid = |message: String| ApiError::InvalidFeed {
        path: path.to_path_buf(),
        message,
    };

    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let products = parse_products(&text).map_err(invalid)?;
    debug!(path = %path.display(), rows = products.len(), "Product feed loaded");
    Ok(products)
}

/// Parse feed text. Rows without a row number get their position in the feed.
pub fn parse_products(text: &str) -> Result<Vec<ProductRecord>, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let Value::Array(rows) = value else {
        return Err("expected a JSON array of product rows".to_string());
    };

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let mut product: ProductRecord = serde_json::from_value(row)
                .map_err(|e| format!("row {}: {}", index + 1, e))?;
            if product.row_number == 0 {
                product.row_number = index as u32 + FIRST_DATA_ROW;
            }
            Ok(product)
        })
        .collect()
}
