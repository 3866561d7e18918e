//! Provider listing, text and json.

use super::shared::to_json;
use crate::config::AdConfig;
use crate::error::ApiError;
use crate::provider::registry::order_by_fallback;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

/// Providers in selection order with availability, cost and limits.
pub fn format_provider_list(config: &AdConfig, format: &str) -> Result<String, ApiError> {
    let ordered = order_by_fallback(&config.providers, &config.fallback.order);

    if format == "json" {
        let providers: Vec<_> = ordered
            .iter()
            .map(|p| {
                json!({
                    "kind": p.kind,
                    "name": p.name,
                    "endpoint": p.endpoint,
                    "available": p.is_available(),
                    "enabled": p.enabled,
                    "api_key_env": p.api_key_env_var(),
                    "cost_per_image": p.cost_per_image,
                    "rate_limit": p.rate_limit,
                    "rate_limit_window_secs": p.rate_limit_window_secs,
                    "max_resolution": p.max_resolution,
                    "max_reference_images": p.max_reference_images,
                    "supports_multi_reference": p.supports_multi_reference,
                })
            })
            .collect();
        let out = json!({
            "providers": providers,
            "fallback_enabled": config.fallback.enabled,
            "total": ordered.len(),
        });
        return to_json(&out);
    }

    if ordered.is_empty() {
        return Ok("No providers configured.".to_string());
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec![
        "Provider", "Name", "Status", "Cost/image", "Rate limit", "Max res", "Max refs",
    ]);
    for p in &ordered {
        let status = if p.is_available() {
            "available".green().to_string()
        } else if !p.enabled {
            "disabled".dimmed().to_string()
        } else {
            format!("{} (set {})", "no key".red(), p.api_key_env_var())
        };
        table.add_row(vec![
            p.kind.to_string(),
            p.name.clone(),
            status,
            format!("${:.4}", p.cost_per_image),
            format!("{}/{}s", p.rate_limit, p.rate_limit_window_secs),
            p.max_resolution.to_string(),
            p.max_reference_images.to_string(),
        ]);
    }

    let available = ordered.iter().filter(|p| p.is_available()).count();
    Ok(format!(
        "{}\n\nAvailable: {}/{}  Fallback: {}",
        table,
        available,
        ordered.len(),
        if config.fallback.enabled { "on" } else { "off" }
    ))
}
