//! Provider selection: preferred provider first, then the rest in registry order.

use crate::error::{ProviderError, ProviderRejection};
use crate::generation::GenerationRequest;
use crate::provider::{ImageProvider, ProviderRegistry};
use std::sync::Arc;
use tracing::debug;

/// Whether a passing candidate takes a rate-limit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotUse {
    Reserve,
    Skip,
}

/// Pick the provider for one attempt.
///
/// A candidate must pass `validate` and then `check_rate_limit` (which reserves a slot).
/// Every rejection is reported in the returned error so the item's message explains why.
pub fn select_provider(
    registry: &ProviderRegistry,
    request: &GenerationRequest,
) -> Result<Arc<dyn ImageProvider>, ProviderError> {
    select(registry, request, SlotUse::Reserve)
}

/// The provider `select_provider` would pick, without touching rate limits.
pub fn plan_provider(
    registry: &ProviderRegistry,
    request: &GenerationRequest,
) -> Result<Arc<dyn ImageProvider>, ProviderError> {
    select(registry, request, SlotUse::Skip)
}

fn select(
    registry: &ProviderRegistry,
    request: &GenerationRequest,
    slots: SlotUse,
) -> Result<Arc<dyn ImageProvider>, ProviderError> {
    let mut rejections = Vec::new();

    if let Some(preferred) = request.provider {
        match registry.get(preferred) {
            Some(provider) => match try_candidate(provider, request, slots) {
                Ok(()) => return Ok(Arc::clone(provider)),
                Err(reason) => rejections.push(ProviderRejection {
                    provider: preferred,
                    reason,
                }),
            },
            None => rejections.push(ProviderRejection {
                provider: preferred,
                reason: "Provider not configured".to_string(),
            }),
        }
        if !registry.fallback_enabled() {
            return Err(ProviderError::NoProviderAvailable { rejections });
        }
    }

    let fallback_only_first = !registry.fallback_enabled();
    for provider in registry.providers() {
        if Some(provider.kind()) == request.provider {
            continue;
        }
        match try_candidate(provider, request, slots) {
            Ok(()) => {
                if slots == SlotUse::Reserve {
                    debug!(
                        preferred = ?request.provider,
                        selected = %provider.kind(),
                        "Falling back to alternate provider"
                    );
                }
                return Ok(Arc::clone(provider));
            }
            Err(reason) => rejections.push(ProviderRejection {
                provider: provider.kind(),
                reason,
            }),
        }
        if fallback_only_first {
            break;
        }
    }

    Err(ProviderError::NoProviderAvailable { rejections })
}

fn try_candidate(
    provider: &Arc<dyn ImageProvider>,
    request: &GenerationRequest,
    slots: SlotUse,
) -> Result<(), String> {
    provider.validate(request)?;
    if slots == SlotUse::Reserve && !provider.check_rate_limit() {
        return Err("Rate limit reached".to_string());
    }
    Ok(())
}
