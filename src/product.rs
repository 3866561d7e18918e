//! Product feed rows.

use crate::types::{OverlayPosition, ProviderKind};
use serde::{Deserialize, Serialize};

/// One product row from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Spreadsheet row; 0 means "assign from feed position"
    #[serde(default)]
    pub row_number: u32,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub brand_name: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub product_price: Option<String>,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub product_url_1: Option<String>,
    #[serde(default)]
    pub product_url_2: Option<String>,
    #[serde(default)]
    pub product_url_3: Option<String>,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub output_name: Option<String>,
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    #[serde(default)]
    pub max_cost: Option<f64>,
    #[serde(default)]
    pub add_product_overlay: bool,
    #[serde(default)]
    pub overlay_position: OverlayPosition,
}

fn non_empty(url: &Option<String>) -> Option<String> {
    url.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ProductRecord {
    /// Minimal record for tests and programmatic admission.
    pub fn new(row_number: u32, product_name: &str, brand_name: &str, prompt: &str) -> Self {
        Self {
            row_number,
            product_name: product_name.to_string(),
            brand_name: brand_name.to_string(),
            prompt: prompt.to_string(),
            product_price: None,
            product_url: None,
            product_url_1: None,
            product_url_2: None,
            product_url_3: None,
            model_url: None,
            output_name: None,
            provider: None,
            max_cost: None,
            add_product_overlay: false,
            overlay_position: OverlayPosition::default(),
        }
    }

    /// Reject rows that cannot become a generation request.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("product_name", &self.product_name),
            ("prompt", &self.prompt),
            ("brand_name", &self.brand_name),
        ] {
            if value.trim().is_empty() {
                return Err(format!("Required field '{}' cannot be empty", field));
            }
        }
        if let Some(cost) = self.max_cost {
            if !(cost > 0.0) {
                return Err(format!("max_cost must be positive, got {}", cost));
            }
        }
        Ok(())
    }

    /// Product images, then the model image.
    pub fn reference_images(&self) -> Vec<String> {
        let mut images = self.product_images();
        images.extend(non_empty(&self.model_url));
        images
    }

    pub fn product_images(&self) -> Vec<String> {
        [&self.product_url_1, &self.product_url_2, &self.product_url_3]
            .into_iter()
            .filter_map(non_empty)
            .collect()
    }

    pub fn needs_model_generation(&self) -> bool {
        non_empty(&self.model_url).is_none()
    }

    pub fn enhanced_prompt(&self) -> String {
        let prompt = self.prompt.trim();
        if self.needs_model_generation() {
            format!(
                "Professional model wearing {}. Full body shot with natural pose and lighting.",
                prompt
            )
        } else {
            prompt.to_string()
        }
    }

    /// File stem used for generated assets.
    pub fn output_stem(&self) -> String {
        let raw = non_empty(&self.output_name).unwrap_or_else(|| self.product_name.clone());
        sanitize_file_component(&raw)
    }
}

/// Replace characters that are unsafe in a path component.
pub fn sanitize_file_component(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}
