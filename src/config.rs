//! Configuration System
//!
//! One explicit [`AdConfig`] is built at startup by [`ConfigLoader`] and passed down to the
//! registry, dispatcher and output writer. Layers: built-in defaults, the user config file,
//! workspace config files, then `ADBATCH__SECTION__KEY` environment variables.

use crate::generation::GenerationDefaults;
use crate::logging::LoggingConfig;
use crate::provider::{HttpSettings, PollPolicy, ProviderSettings, RetryPolicy};
use crate::types::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Concurrency above this works but tends to trip provider rate limits.
const CONCURRENCY_WARNING_THRESHOLD: usize = 10;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdConfig {
    /// Provider settings in configuration order
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderSettings>,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub generation: GenerationDefaults,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub cost: CostConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_providers() -> Vec<ProviderSettings> {
    ProviderKind::ALL
        .iter()
        .map(|kind| ProviderSettings::defaults_for(*kind))
        .collect()
}

impl Default for AdConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            fallback: FallbackConfig::default(),
            generation: GenerationDefaults::default(),
            dispatch: DispatchConfig::default(),
            cost: CostConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Provider fallback routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Selection order; unlisted providers follow in configuration order
    #[serde(default = "default_fallback_order")]
    pub order: Vec<ProviderKind>,
}

fn default_true() -> bool {
    true
}

fn default_fallback_order() -> Vec<ProviderKind> {
    vec![
        ProviderKind::SeedreamKie,
        ProviderKind::NanoBanana,
        ProviderKind::SeedreamAiml,
    ]
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            order: default_fallback_order(),
        }
    }
}

/// Worker pool, retry budget, checkpointing and HTTP timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub concurrency: usize,
    pub max_retries: u32,
    /// Checkpoint file; no checkpointing when unset
    pub checkpoint_path: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub poll_timeout_secs: u64,
    pub transport_attempts: u32,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_retries: 3,
            checkpoint_path: None,
            poll_interval_ms: 2000,
            poll_timeout_secs: 120,
            transport_attempts: 3,
            backoff_min_ms: 2000,
            backoff_max_ms: 10_000,
            request_timeout_secs: 60,
        }
    }
}

impl DispatchConfig {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            retry: RetryPolicy {
                attempts: self.transport_attempts.max(1),
                min_backoff: Duration::from_millis(self.backoff_min_ms),
                max_backoff: Duration::from_millis(self.backoff_max_ms),
            },
            poll: PollPolicy {
                interval: Duration::from_millis(self.poll_interval_ms),
                timeout: Duration::from_secs(self.poll_timeout_secs),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub max_cost_per_image: f64,
    pub total_budget_limit: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            max_cost_per_image: 0.05,
            total_budget_limit: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub organize_by_brand: bool,
    pub download_images: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./product_ads"),
            organize_by_brand: true,
            download_images: true,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Provider(ProviderKind, String),
    Dispatch(String),
    NoProviderAvailable,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(kind, msg) => write!(f, "Provider '{}': {}", kind, msg),
            ValidationError::Dispatch(msg) => write!(f, "Dispatch: {}", msg),
            ValidationError::NoProviderAvailable => write!(
                f,
                "No provider is available (set an API key, e.g. {})",
                ProviderSettings::defaults_for(ProviderKind::SeedreamKie).api_key_env_var()
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Suspicious but usable settings
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    CostLimits { per_image: f64, budget: f64 },
    HighConcurrency(usize),
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::CostLimits { per_image, budget } => write!(
                f,
                "max_cost_per_image ({}) is not below total_budget_limit ({})",
                per_image, budget
            ),
            ConfigWarning::HighConcurrency(n) => write!(
                f,
                "concurrency {} is above {} and may hit provider rate limits",
                n, CONCURRENCY_WARNING_THRESHOLD
            ),
        }
    }
}

impl AdConfig {
    /// Validate the entire configuration. Warnings are returned only when there are no errors.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, Vec<ValidationError>> {
        let mut errors = Vec::new();

        for provider in &self.providers {
            if let Err(e) = provider.validate() {
                errors.push(ValidationError::Provider(provider.kind, e));
            }
        }
        if !self.providers.iter().any(ProviderSettings::is_available) {
            errors.push(ValidationError::NoProviderAvailable);
        }
        if self.dispatch.concurrency == 0 {
            errors.push(ValidationError::Dispatch(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.dispatch.max_retries == 0 {
            errors.push(ValidationError::Dispatch(
                "max_retries must be at least 1".to_string(),
            ));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut warnings = Vec::new();
        if self.cost.max_cost_per_image >= self.cost.total_budget_limit {
            warnings.push(ConfigWarning::CostLimits {
                per_image: self.cost.max_cost_per_image,
                budget: self.cost.total_budget_limit,
            });
        }
        if self.dispatch.concurrency > CONCURRENCY_WARNING_THRESHOLD {
            warnings.push(ConfigWarning::HighConcurrency(self.dispatch.concurrency));
        }
        Ok(warnings)
    }

    /// Fill empty API keys from `{KIND}_API_KEY` environment variables.
    pub fn resolve_api_keys_from_env(&mut self) {
        for provider in &mut self.providers {
            if !provider.api_key.trim().is_empty() {
                continue;
            }
            let var = provider.api_key_env_var();
            if let Ok(key) = std::env::var(&var) {
                if !key.trim().is_empty() {
                    debug!(provider = %provider.kind, env = %var, "API key taken from environment");
                    provider.api_key = key;
                }
            }
        }
    }

    pub fn provider(&self, kind: ProviderKind) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.kind == kind)
    }

    pub fn provider_mut(&mut self, kind: ProviderKind) -> Option<&mut ProviderSettings> {
        self.providers.iter_mut().find(|p| p.kind == kind)
    }
}
