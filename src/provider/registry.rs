//! Ordered set of usable providers.

use crate::config::AdConfig;
use crate::error::{ApiError, ProviderError};
use crate::provider::http::HttpSettings;
use crate::provider::{ImageProvider, NanoBananaProvider, ProviderSettings, SeedreamProvider};
use crate::types::ProviderKind;
use std::sync::Arc;
use tracing::{debug, info};

/// Providers in selection order. Configuration order is the fallback tie-break.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ImageProvider>>,
    fallback_enabled: bool,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        Self {
            providers,
            fallback_enabled: true,
        }
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    /// Build a backend for every available provider, ordered by the fallback order.
    pub fn from_config(config: &AdConfig) -> Result<Self, ApiError> {
        let http = config.dispatch.http_settings();
        let mut providers = Vec::new();
        for settings in order_by_fallback(&config.providers, &config.fallback.order) {
            if !settings.is_available() {
                debug!(provider = %settings.kind, "Skipping provider without API key");
                continue;
            }
            providers.push(build_provider(settings, &http)?);
        }
        info!(
            providers = providers.len(),
            fallback = config.fallback.enabled,
            "Provider registry built"
        );
        Ok(Self::new(providers).with_fallback(config.fallback.enabled))
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn ImageProvider>> {
        self.providers.iter().find(|p| p.kind() == kind)
    }

    pub fn providers(&self) -> &[Arc<dyn ImageProvider>] {
        &self.providers
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback_enabled
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.kinds())
            .field("fallback_enabled", &self.fallback_enabled)
            .finish()
    }
}

/// Construct the HTTP backend for one provider.
pub fn build_provider(
    settings: &ProviderSettings,
    http: &HttpSettings,
) -> Result<Arc<dyn ImageProvider>, ProviderError> {
    let provider: Arc<dyn ImageProvider> = match settings.kind {
        ProviderKind::NanoBanana => Arc::new(NanoBananaProvider::new(settings.clone(), http)?),
        ProviderKind::SeedreamKie | ProviderKind::SeedreamAiml | ProviderKind::SeedreamByteplus => {
            Arc::new(SeedreamProvider::new(settings.clone(), http)?)
        }
    };
    Ok(provider)
}

/// Listed kinds first in the given order, then the rest in configuration order.
pub fn order_by_fallback<'a>(
    settings: &'a [ProviderSettings],
    order: &[ProviderKind],
) -> Vec<&'a ProviderSettings> {
    let mut ordered: Vec<&ProviderSettings> = Vec::with_capacity(settings.len());
    for kind in order {
        if let Some(found) = settings.iter().find(|s| s.kind == *kind) {
            if !ordered.iter().any(|s| s.kind == found.kind) {
                ordered.push(found);
            }
        }
    }
    for s in settings {
        if !ordered.iter().any(|o| o.kind == s.kind) {
            ordered.push(s);
        }
    }
    ordered
}
