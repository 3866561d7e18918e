//! Provider selection and registry construction.

use crate::integration::test_utils::{item, registry, MockProvider};
use adbatch::config::AdConfig;
use adbatch::error::ProviderError;
use adbatch::generation::GenerationRequest;
use adbatch::provider::{ProviderRegistry, ProviderSettings, RateWindow};
use adbatch::queue::select_provider;
use adbatch::types::ProviderKind;
use std::sync::Arc;
use std::time::Duration;

fn request(preferred: Option<ProviderKind>) -> GenerationRequest {
    let mut request = item(1, 100, 3).request;
    request.provider = preferred;
    request
}

fn mocks() -> (Arc<MockProvider>, Arc<MockProvider>, Arc<MockProvider>) {
    (
        Arc::new(MockProvider::new(ProviderKind::SeedreamKie)),
        Arc::new(MockProvider::new(ProviderKind::SeedreamAiml)),
        Arc::new(MockProvider::new(ProviderKind::NanoBanana)),
    )
}

fn rejection_text(result: Result<impl Sized, ProviderError>) -> String {
    match result {
        Err(err @ ProviderError::NoProviderAvailable { .. }) => err.to_string(),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected selection to fail"),
    }
}

#[test]
fn preferred_provider_wins_when_usable() {
    let (kie, aiml, nano) = mocks();
    let registry = registry(&[kie, aiml, nano]);

    let chosen = select_provider(&registry, &request(Some(ProviderKind::NanoBanana))).unwrap();
    assert_eq!(chosen.kind(), ProviderKind::NanoBanana);
}

#[test]
fn fallback_follows_registry_order() {
    let (kie, aiml, nano) = mocks();
    kie.set_rate_limited(true);
    let registry = registry(&[kie, aiml, nano]);

    let chosen = select_provider(&registry, &request(Some(ProviderKind::SeedreamKie))).unwrap();
    assert_eq!(chosen.kind(), ProviderKind::SeedreamAiml);
}

#[test]
fn fallback_skips_providers_that_reject_the_request() {
    let (kie, _, nano) = mocks();
    kie.set_rate_limited(true);
    let aiml = Arc::new(
        MockProvider::new(ProviderKind::SeedreamAiml)
            .with_settings(|s: &mut ProviderSettings| s.max_reference_images = 0),
    );
    let registry = registry(&[kie, aiml, nano]);

    let mut req = request(Some(ProviderKind::SeedreamKie));
    req.reference_images = vec!["https://img.test/a.png".to_string()];
    let chosen = select_provider(&registry, &req).unwrap();
    assert_eq!(chosen.kind(), ProviderKind::NanoBanana);
}

#[test]
fn disabled_fallback_only_tries_the_preferred_provider() {
    let (kie, aiml, nano) = mocks();
    kie.set_rate_limited(true);
    let registry = registry(&[kie, aiml, nano]).with_fallback(false);

    let text = rejection_text(select_provider(
        &registry,
        &request(Some(ProviderKind::SeedreamKie)),
    ));
    assert_eq!(
        text,
        "No suitable provider available (seedream_kie: Rate limit reached)"
    );
}

#[test]
fn no_preference_takes_first_usable_provider() {
    let (kie, aiml, nano) = mocks();
    kie.set_rate_limited(true);
    let registry = registry(&[kie, aiml, nano]);

    let chosen = select_provider(&registry, &request(None)).unwrap();
    assert_eq!(chosen.kind(), ProviderKind::SeedreamAiml);
}

#[test]
fn no_preference_without_fallback_tries_only_the_first() {
    let (kie, aiml, nano) = mocks();
    kie.set_rate_limited(true);
    let registry = registry(&[kie, aiml, nano]).with_fallback(false);

    let text = rejection_text(select_provider(&registry, &request(None)));
    assert!(text.contains("seedream_kie: Rate limit reached"));
    assert!(!text.contains("seedream_aiml"));
}

#[test]
fn unregistered_preferred_provider_falls_back() {
    let (kie, aiml, nano) = mocks();
    let registry = registry(&[kie, aiml, nano]);

    let chosen =
        select_provider(&registry, &request(Some(ProviderKind::SeedreamByteplus))).unwrap();
    assert_eq!(chosen.kind(), ProviderKind::SeedreamKie);

    let strict = registry.with_fallback(false);
    let text = rejection_text(select_provider(
        &strict,
        &request(Some(ProviderKind::SeedreamByteplus)),
    ));
    assert!(text.contains("seedream_byteplus: Provider not configured"));
}

#[test]
fn every_rejection_is_listed() {
    let (kie, aiml, nano) = mocks();
    kie.set_rate_limited(true);
    aiml.set_rate_limited(true);
    nano.set_rate_limited(true);
    let registry = registry(&[kie, aiml, nano]);

    let text = rejection_text(select_provider(
        &registry,
        &request(Some(ProviderKind::NanoBanana)),
    ));
    assert_eq!(
        text,
        "No suitable provider available (nano_banana: Rate limit reached; \
         seedream_kie: Rate limit reached; seedream_aiml: Rate limit reached)"
    );
}

#[test]
fn empty_registry_has_nothing_to_offer() {
    let registry = ProviderRegistry::new(Vec::new());
    let text = rejection_text(select_provider(&registry, &request(None)));
    assert_eq!(text, "No suitable provider available");
}

#[test]
fn rate_window_reserves_slots_until_the_window_resets() {
    let window = RateWindow::new(2, Duration::from_millis(40));
    assert!(window.try_acquire());
    assert!(window.try_acquire());
    assert!(!window.try_acquire());
    assert_eq!(window.remaining(), 0);

    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(window.remaining(), 2);
    assert!(window.try_acquire());
}

#[test]
fn registry_from_config_keeps_keyed_providers_in_fallback_order() {
    let mut config = AdConfig::default();
    for kind in [ProviderKind::SeedreamAiml, ProviderKind::NanoBanana] {
        config.provider_mut(kind).unwrap().api_key = "key".to_string();
    }

    let registry = ProviderRegistry::from_config(&config).unwrap();
    assert_eq!(
        registry.kinds(),
        vec![ProviderKind::NanoBanana, ProviderKind::SeedreamAiml]
    );
    assert!(registry.fallback_enabled());
}
