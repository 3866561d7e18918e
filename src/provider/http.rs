//! HTTP transport shared by the provider backends: bounded retry with exponential
//! backoff for every call, and fixed-interval polling for asynchronous tasks.

use crate::error::ProviderError;
use crate::provider::TaskStatus;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level retry: `attempts` tries, delay doubling from `min_backoff` up to `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = self.min_backoff.saturating_mul(factor);
        delay.clamp(self.min_backoff, self.max_backoff.max(self.min_backoff))
    }
}

/// Polling cadence for asynchronous provider tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Everything a backend needs to talk HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub poll: PollPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
        }
    }
}

/// Authenticated JSON client with retry.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    api_key: String,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(api_key: &str, settings: &HttpSettings) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(settings.request_timeout))
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ProviderError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            retry: settings.retry,
        })
    }

    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ProviderError> {
        self.with_retry("POST", url, move || async move {
            let response = self
                .client
                .post(url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await
                .map_err(map_transport_error)?;
            read_json(response).await
        })
        .await
    }

    pub async fn get_json(&self, url: &str) -> Result<Value, ProviderError> {
        self.with_retry("GET", url, move || async move {
            let response = self
                .client
                .get(url)
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(map_transport_error)?;
            read_json(response).await
        })
        .await
    }

    /// Fetch a generated image. Result URLs are usually pre-signed, so no auth header.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.with_retry("GET", url, move || async move {
            let response = self.client.get(url).send().await.map_err(map_transport_error)?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(map_http_status(status, &body));
            }
            let bytes = response.bytes().await.map_err(map_transport_error)?;
            Ok(bytes.to_vec())
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, method: &str, url: &str, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        method,
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Provider request failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(map_http_status(status, &body));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::MalformedResponse(format!("Invalid JSON body: {}", e)))
}

/// Map a non-success status to the provider failure taxonomy.
pub fn map_http_status(status: StatusCode, body: &str) -> ProviderError {
    let detail = error_detail(body);
    match status.as_u16() {
        401 | 403 => ProviderError::AuthFailed(format!("status {}: {}", status, detail)),
        429 => ProviderError::RateLimited(format!("status {}: {}", status, detail)),
        500..=599 => ProviderError::RequestFailed(format!("status {}: {}", status, detail)),
        _ => ProviderError::GenerationFailed(format!(
            "Request rejected with status {}: {}",
            status, detail
        )),
    }
}

fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::RequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ProviderError::RequestFailed(format!("Connection error: {}", error))
    } else if error.is_decode() {
        ProviderError::MalformedResponse(format!("Undecodable body: {}", error))
    } else {
        ProviderError::RequestFailed(format!("HTTP error: {}", error))
    }
}

/// Prefer a JSON `message`/`error` field, else the first 200 characters of the body.
fn error_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }
    body.chars().take(200).collect()
}

/// Interpret a status document. `done` and `failed` list the status words a backend uses.
pub fn parse_task_status(value: &Value, done: &[&str], failed: &[&str]) -> TaskStatus {
    let state = value
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_lowercase();

    if done.contains(&state.as_str()) {
        let image_url = value
            .pointer("/result/image_url")
            .or_else(|| value.get("image_url"))
            .and_then(Value::as_str);
        return match image_url {
            Some(url) => TaskStatus::Completed {
                image_url: url.to_string(),
            },
            None => TaskStatus::Failed {
                error: "Completed but no image URL".to_string(),
            },
        };
    }
    if failed.contains(&state.as_str()) {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        return TaskStatus::Failed { error };
    }
    TaskStatus::Pending { state }
}

/// Poll `check` every `policy.interval` until the task finishes or `policy.timeout` elapses.
///
/// Transport errors on a single poll are logged and polling continues.
pub async fn poll_for_completion<F, Fut>(
    policy: &PollPolicy,
    task_id: &str,
    mut check: F,
) -> Result<String, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TaskStatus, ProviderError>>,
{
    let started = Instant::now();
    while started.elapsed() < policy.timeout {
        match check().await {
            Ok(TaskStatus::Completed { image_url }) => return Ok(image_url),
            Ok(TaskStatus::Failed { error }) => {
                return Err(ProviderError::GenerationFailed(error));
            }
            Ok(TaskStatus::Pending { state }) => {
                debug!(task_id, state = %state, "Task still running");
            }
            Err(err) => {
                warn!(task_id, error = %err, "Poll attempt failed");
            }
        }
        sleep(policy.interval).await;
    }
    Err(ProviderError::Timeout(format!(
        "Generation timeout after {} seconds",
        policy.timeout.as_secs()
    )))
}
