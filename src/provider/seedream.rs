//! Seedream backends (Kie.ai, AI/ML API, BytePlus).
//!
//! All three resellers expose the same task API: `POST {endpoint}/generate` returns a
//! `task_id`, then `GET {endpoint}/status/{task_id}` is polled until the task completes.

use crate::error::ProviderError;
use crate::generation::{GenerationRequest, GenerationResult};
use crate::provider::http::{self, HttpSettings, HttpTransport, PollPolicy};
use crate::provider::{ensure_valid, ImageProvider, ProviderSettings, RateWindow, TaskStatus};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

const MODEL: &str = "seedream-4.0";

pub struct SeedreamProvider {
    settings: ProviderSettings,
    transport: HttpTransport,
    poll: PollPolicy,
    rate: RateWindow,
}

impl SeedreamProvider {
    pub fn new(settings: ProviderSettings, http: &HttpSettings) -> Result<Self, ProviderError> {
        let transport = HttpTransport::new(&settings.api_key, http)?;
        let rate = RateWindow::new(settings.rate_limit, settings.rate_limit_window());
        Ok(Self {
            settings,
            transport,
            poll: http.poll,
            rate,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.endpoint.trim_end_matches('/'), path)
    }

    /// Request body for the generate call.
    pub fn payload(request: &GenerationRequest) -> Value {
        let mut payload = json!({
            "prompt": request.prompt,
            "model": MODEL,
            "guidance_scale": request.guidance_scale,
            "num_inference_steps": request.num_inference_steps,
            "aspect_ratio": request.size.ratio(),
            "resolution": request.resolution.dimensions(),
        });

        let references = http_urls(&request.reference_images);
        if !references.is_empty() {
            payload["reference_images"] = json!(references);
            let products = request.product.product_images();
            if request.product.needs_model_generation() {
                payload["reference_mode"] = json!("products_only");
                payload["product_images"] = json!(references);
                payload["generate_person"] = json!(true);
            } else {
                payload["reference_mode"] = json!("person_with_products");
                payload["person_image"] = json!(request.product.model_url);
                payload["product_images"] = json!(products);
            }
        }

        if request.product.needs_model_generation() {
            payload["enhance_prompt"] = json!(true);
            payload["add_model_description"] = json!(true);
        }
        payload
    }
}

/// Only absolute http(s) URLs are forwarded as references.
pub(crate) fn http_urls(urls: &[String]) -> Vec<String> {
    urls.iter()
        .map(|u| u.trim())
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl ImageProvider for SeedreamProvider {
    fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn check_rate_limit(&self) -> bool {
        self.rate.try_acquire()
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ProviderError> {
        ensure_valid(&self.settings, request)?;
        let started = Instant::now();

        let response = self
            .transport
            .post_json(&self.url("generate"), &Self::payload(request))
            .await?;
        let task_id = response
            .get("task_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::MalformedResponse("No task_id in response".to_string()))?
            .to_string();
        debug!(provider = %self.settings.kind, task_id = %task_id, "Generation task submitted");

        let image_url =
            http::poll_for_completion(&self.poll, &task_id, || self.get_status(&task_id)).await?;

        let elapsed = started.elapsed().as_secs_f64();
        info!(
            provider = %self.settings.kind,
            task_id = %task_id,
            duration_ms = (elapsed * 1000.0) as u64,
            "Generation completed"
        );
        Ok(GenerationResult::success(
            request,
            self.settings.kind,
            Some(task_id),
            image_url,
            elapsed,
            self.settings.estimate_cost(request),
        ))
    }

    async fn get_status(&self, task_id: &str) -> Result<TaskStatus, ProviderError> {
        let body = self
            .transport
            .get_json(&self.url(&format!("status/{}", task_id)))
            .await?;
        Ok(http::parse_task_status(&body, &["completed"], &["failed"]))
    }

    async fn download_result(&self, image_url: &str) -> Result<Vec<u8>, ProviderError> {
        self.transport.get_bytes(image_url).await
    }
}
