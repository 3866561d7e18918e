//! Error types for the batch advertisement generator.

use crate::types::ProviderKind;
use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors (checkpoint, feed and output files)
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Incompatible checkpoint: {0}")]
    IncompatibleCheckpoint(String),
}

/// Why a single provider was passed over during selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRejection {
    pub provider: ProviderKind,
    pub reason: String,
}

impl std::fmt::Display for ProviderRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.reason)
    }
}

/// Failure of one generation attempt.
///
/// The rendered message is stored verbatim on the work item, so variants carry
/// human-readable reasons rather than structured payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("No suitable provider available{}", format_rejections(.rejections))]
    NoProviderAvailable { rejections: Vec<ProviderRejection> },
}

fn format_rejections(rejections: &[ProviderRejection]) -> String {
    if rejections.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = rejections.iter().map(|r| r.to_string()).collect();
    format!(" ({})", parts.join("; "))
}

impl ProviderError {
    /// Whether the transport layer should retry the HTTP call that produced this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_) | ProviderError::RequestFailed(_)
        )
    }
}

/// Crate-level errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("Invalid product feed {path}: {message}")]
    InvalidFeed { path: PathBuf, message: String },

    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
