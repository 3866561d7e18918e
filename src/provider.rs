//! Image Provider Abstraction
//!
//! Uniform interface over the image-generation backends. The dispatcher only sees
//! [`ImageProvider`]; each backend supplies its own wire protocol behind it. Shared
//! request validation, cost estimation and rate limiting live here so that every
//! backend applies the same rules.

use crate::error::ProviderError;
use crate::generation::{GenerationRequest, GenerationResult};
use crate::types::{ProviderKind, Resolution};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub mod http;
pub mod nano_banana;
pub mod registry;
pub mod seedream;

pub use http::{HttpSettings, HttpTransport, PollPolicy, RetryPolicy};
pub use nano_banana::NanoBananaProvider;
pub use registry::ProviderRegistry;
pub use seedream::SeedreamProvider;

/// Configuration of one provider, in configuration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ProviderSettingsFile")]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub name: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub endpoint: String,
    pub supports_multi_reference: bool,
    pub max_resolution: Resolution,
    pub cost_per_image: f64,
    /// Requests allowed per window
    pub rate_limit: u32,
    pub rate_limit_window_secs: u64,
    pub max_reference_images: usize,
    pub enabled: bool,
}

/// On-disk shape: everything except `kind` falls back to the per-kind defaults.
#[derive(Debug, Deserialize)]
struct ProviderSettingsFile {
    kind: ProviderKind,
    name: Option<String>,
    api_key: Option<String>,
    endpoint: Option<String>,
    supports_multi_reference: Option<bool>,
    max_resolution: Option<Resolution>,
    cost_per_image: Option<f64>,
    rate_limit: Option<u32>,
    rate_limit_window_secs: Option<u64>,
    max_reference_images: Option<usize>,
    enabled: Option<bool>,
}

impl From<ProviderSettingsFile> for ProviderSettings {
    fn from(file: ProviderSettingsFile) -> Self {
        let base = ProviderSettings::defaults_for(file.kind);
        Self {
            kind: file.kind,
            name: file.name.unwrap_or(base.name),
            api_key: file.api_key.unwrap_or(base.api_key),
            endpoint: file.endpoint.unwrap_or(base.endpoint),
            supports_multi_reference: file
                .supports_multi_reference
                .unwrap_or(base.supports_multi_reference),
            max_resolution: file.max_resolution.unwrap_or(base.max_resolution),
            cost_per_image: file.cost_per_image.unwrap_or(base.cost_per_image),
            rate_limit: file.rate_limit.unwrap_or(base.rate_limit),
            rate_limit_window_secs: file
                .rate_limit_window_secs
                .unwrap_or(base.rate_limit_window_secs),
            max_reference_images: file
                .max_reference_images
                .unwrap_or(base.max_reference_images),
            enabled: file.enabled.unwrap_or(base.enabled),
        }
    }
}

impl ProviderSettings {
    /// Built-in profile for a backend, without an API key.
    pub fn defaults_for(kind: ProviderKind) -> Self {
        let (name, endpoint, max_resolution, cost_per_image, rate_limit, max_refs) = match kind {
            ProviderKind::SeedreamKie => (
                "Seedream via Kie.ai",
                "https://api.kie.ai/v1/seedream",
                Resolution::FourK,
                0.0175,
                100,
                4,
            ),
            ProviderKind::NanoBanana => (
                "Nano Banana",
                "https://api.nano-banana.com/v1",
                Resolution::TwoK,
                0.02,
                60,
                3,
            ),
            ProviderKind::SeedreamAiml => (
                "Seedream via AI/ML API",
                "https://api.aimlapi.com/v1/seedream",
                Resolution::FourK,
                0.025,
                80,
                4,
            ),
            ProviderKind::SeedreamByteplus => (
                "Seedream via BytePlus",
                "https://api.byteplus.com/v1/seedream",
                Resolution::FourK,
                0.03,
                120,
                4,
            ),
        };
        Self {
            kind,
            name: name.to_string(),
            api_key: String::new(),
            endpoint: endpoint.to_string(),
            supports_multi_reference: true,
            max_resolution,
            cost_per_image,
            rate_limit,
            rate_limit_window_secs: 60,
            max_reference_images: max_refs,
            enabled: true,
        }
    }

    /// Environment variable consulted when no API key is configured.
    pub fn api_key_env_var(&self) -> String {
        format!("{}_API_KEY", self.kind.as_str().to_uppercase())
    }

    pub fn is_available(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty()
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Validate the configuration itself (not a request).
    pub fn validate(&self) -> Result<(), String> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(format!("Invalid endpoint URL: '{}'", self.endpoint));
        }
        if !(self.cost_per_image > 0.0) {
            return Err("cost_per_image must be positive".to_string());
        }
        if self.rate_limit == 0 {
            return Err("rate_limit must be greater than zero".to_string());
        }
        if self.rate_limit_window_secs == 0 {
            return Err("rate_limit_window_secs must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Check a request against this provider's preconditions.
    pub fn validate_request(&self, request: &GenerationRequest) -> Result<(), String> {
        if self.api_key.trim().is_empty() {
            return Err("API key not configured".to_string());
        }
        let refs = request.reference_images.len();
        if refs > self.max_reference_images {
            return Err(format!(
                "Too many reference images. Maximum allowed: {}",
                self.max_reference_images
            ));
        }
        if refs > 1 && !self.supports_multi_reference {
            return Err("Provider does not support multiple reference images".to_string());
        }
        if request.resolution > self.max_resolution {
            return Err(format!(
                "Provider does not support {} resolution",
                request.resolution
            ));
        }
        if let Some(max_cost) = request.max_cost {
            let estimate = self.estimate_cost(request);
            if estimate > max_cost {
                return Err(format!(
                    "Estimated cost {:.4} exceeds max_cost {:.4}",
                    estimate, max_cost
                ));
            }
        }
        Ok(())
    }

    pub fn estimate_cost(&self, request: &GenerationRequest) -> f64 {
        let mut cost = self.cost_per_image;
        if request.resolution == Resolution::FourK {
            cost *= 1.5;
        }
        if request.reference_images.len() > 2 {
            cost *= 1.2;
        }
        cost
    }
}

/// Fixed-window request counter. A successful check reserves one slot.
#[derive(Debug)]
pub struct RateWindow {
    limit: u32,
    window: Duration,
    state: Mutex<RateWindowState>,
}

#[derive(Debug)]
struct RateWindowState {
    started: Instant,
    count: u32,
}

impl RateWindow {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(RateWindowState {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        if now.duration_since(state.started) >= self.window {
            state.started = now;
            state.count = 0;
        }
        if state.count < self.limit {
            state.count += 1;
            true
        } else {
            false
        }
    }

    /// Slots left in the current window.
    pub fn remaining(&self) -> u32 {
        let state = self.state.lock();
        if Instant::now().duration_since(state.started) >= self.window {
            self.limit
        } else {
            self.limit.saturating_sub(state.count)
        }
    }
}

/// Remote task state as reported by a provider's status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending { state: String },
    Completed { image_url: String },
    Failed { error: String },
}

/// Image generation backend.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn settings(&self) -> &ProviderSettings;

    fn kind(&self) -> ProviderKind {
        self.settings().kind
    }

    fn name(&self) -> &str {
        &self.settings().name
    }

    fn validate(&self, request: &GenerationRequest) -> Result<(), String> {
        self.settings().validate_request(request)
    }

    fn estimate_cost(&self, request: &GenerationRequest) -> f64 {
        self.settings().estimate_cost(request)
    }

    /// Reserve a request slot; false when the provider is rate limited.
    fn check_rate_limit(&self) -> bool;

    /// Validate, submit, and wait for the image (immediately or via polling).
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationResult, ProviderError>;

    async fn get_status(&self, task_id: &str) -> Result<TaskStatus, ProviderError>;

    async fn download_result(&self, image_url: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Synchronous backend, adapted with [`BlockingProvider`].
pub trait SyncImageProvider: Send + Sync + 'static {
    fn settings(&self) -> &ProviderSettings;

    fn check_rate_limit(&self) -> bool;

    fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, ProviderError>;

    fn get_status(&self, task_id: &str) -> Result<TaskStatus, ProviderError>;

    fn download_result(&self, image_url: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Runs a synchronous backend on tokio's blocking pool so async workers never stall.
pub struct BlockingProvider<P: SyncImageProvider> {
    inner: Arc<P>,
}

impl<P: SyncImageProvider> BlockingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    async fn run<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        T: Send + 'static,
        F: FnOnce(&P) -> Result<T, ProviderError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || call(inner.as_ref()))
            .await
            .map_err(|e| ProviderError::GenerationFailed(format!("Blocking call aborted: {}", e)))?
    }
}

#[async_trait]
impl<P: SyncImageProvider> ImageProvider for BlockingProvider<P> {
    fn settings(&self) -> &ProviderSettings {
        self.inner.settings()
    }

    fn check_rate_limit(&self) -> bool {
        self.inner.check_rate_limit()
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ProviderError> {
        ensure_valid(self.settings(), request)?;
        let request = request.clone();
        self.run(move |p| p.generate(&request)).await
    }

    async fn get_status(&self, task_id: &str) -> Result<TaskStatus, ProviderError> {
        let task_id = task_id.to_string();
        self.run(move |p| p.get_status(&task_id)).await
    }

    async fn download_result(&self, image_url: &str) -> Result<Vec<u8>, ProviderError> {
        let image_url = image_url.to_string();
        self.run(move |p| p.download_result(&image_url)).await
    }
}

/// Request precondition check shared by every backend's `generate`.
pub fn ensure_valid(
    settings: &ProviderSettings,
    request: &GenerationRequest,
) -> Result<(), ProviderError> {
    settings
        .validate_request(request)
        .map_err(ProviderError::Validation)
}
