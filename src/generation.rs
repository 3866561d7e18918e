//! Provider-agnostic generation request and result payloads.

use crate::product::ProductRecord;
use crate::types::{AspectSize, ProcessingStatus, ProviderKind, Resolution};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Defaults applied when turning a product row into a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDefaults {
    /// Provider hint for rows that do not name one
    #[serde(default = "default_provider")]
    pub default_provider: Option<ProviderKind>,

    #[serde(default)]
    pub size: AspectSize,

    #[serde(default)]
    pub resolution: Resolution,

    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f64,

    #[serde(default = "default_inference_steps")]
    pub num_inference_steps: u32,
}

fn default_provider() -> Option<ProviderKind> {
    Some(ProviderKind::SeedreamKie)
}

fn default_guidance_scale() -> f64 {
    7.5
}

fn default_inference_steps() -> u32 {
    20
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            size: AspectSize::default(),
            resolution: Resolution::default(),
            guidance_scale: default_guidance_scale(),
            num_inference_steps: default_inference_steps(),
        }
    }
}

/// Everything a provider needs to render one ad image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub product: ProductRecord,
    /// Preferred provider; replaced by the provider actually selected
    pub provider: Option<ProviderKind>,
    pub prompt: String,
    #[serde(default)]
    pub reference_images: Vec<String>,
    pub guidance_scale: f64,
    pub num_inference_steps: u32,
    pub size: AspectSize,
    pub resolution: Resolution,
    /// Per-item cost ceiling
    #[serde(default)]
    pub max_cost: Option<f64>,
}

impl GenerationRequest {
    pub fn from_product(product: &ProductRecord, defaults: &GenerationDefaults) -> Self {
        Self {
            provider: product.provider.or(defaults.default_provider),
            prompt: product.enhanced_prompt(),
            reference_images: product.reference_images(),
            guidance_scale: defaults.guidance_scale,
            num_inference_steps: defaults.num_inference_steps,
            size: defaults.size,
            resolution: defaults.resolution,
            max_cost: product.max_cost,
            product: product.clone(),
        }
    }
}

/// Outcome of one generation, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub product_name: String,
    pub brand_name: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub local_image_path: Option<String>,
    #[serde(default)]
    pub provider_used: Option<ProviderKind>,
    pub status: ProcessingStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Seconds spent inside the provider
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub api_cost: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl GenerationResult {
    pub fn success(
        request: &GenerationRequest,
        provider: ProviderKind,
        task_id: Option<String>,
        image_url: String,
        processing_time: f64,
        api_cost: f64,
    ) -> Self {
        Self {
            product_name: request.product.product_name.clone(),
            brand_name: request.product.brand_name.clone(),
            task_id,
            image_url: Some(image_url),
            local_image_path: None,
            provider_used: Some(provider),
            status: ProcessingStatus::Success,
            error_message: None,
            processing_time: Some(processing_time),
            api_cost: Some(api_cost),
            timestamp: Utc::now(),
        }
    }

    /// Result synthesized for an item that never produced one.
    pub fn failure(
        product: &ProductRecord,
        provider: Option<ProviderKind>,
        status: ProcessingStatus,
        error_message: Option<String>,
    ) -> Self {
        Self {
            product_name: product.product_name.clone(),
            brand_name: product.brand_name.clone(),
            task_id: None,
            image_url: None,
            local_image_path: None,
            provider_used: provider,
            status,
            error_message,
            processing_time: None,
            api_cost: None,
            timestamp: Utc::now(),
        }
    }

    pub fn cost(&self) -> f64 {
        self.api_cost.unwrap_or(0.0)
    }
}
