//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::ProviderNotConfigured(_) => format!(
            "{}\nHint: set an API key in config or the environment (e.g. SEEDREAM_KIE_API_KEY).",
            e
        ),
        ApiError::InvalidFeed { .. } => {
            format!("{}\nHint: the feed must be a JSON array of product rows.", e)
        }
        _ => e.to_string(),
    }
}
