//! Nano Banana backend. The generate call answers either with a `task_id` to poll or
//! with the finished `image_url` directly.

use crate::error::ProviderError;
use crate::generation::{GenerationRequest, GenerationResult};
use crate::provider::http::{self, HttpSettings, HttpTransport, PollPolicy};
use crate::provider::seedream::http_urls;
use crate::provider::{ensure_valid, ImageProvider, ProviderSettings, RateWindow, TaskStatus};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

const DONE_STATES: [&str; 3] = ["completed", "success", "done"];
const FAILED_STATES: [&str; 2] = ["failed", "error"];

const PRODUCT_KEYWORDS: [&str; 14] = [
    "dress", "shirt", "shoes", "bag", "watch", "jewelry", "clothing", "apparel", "fashion",
    "accessory", "product", "wearing", "model", "professional",
];

const NEGATIVE_PROMPT: &str = "blurry, low quality, distorted, deformed, bad anatomy, extra limbs, \
missing limbs, poor lighting, overexposed, underexposed, amateur photography, low resolution, \
pixelated, text, watermark, signature, logo";

pub struct NanoBananaProvider {
    settings: ProviderSettings,
    transport: HttpTransport,
    poll: PollPolicy,
    rate: RateWindow,
}

impl NanoBananaProvider {
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

    pub fn payload(request: &GenerationRequest) -> Value {
        let (w, h) = request.size.parts();
        let unit = request.resolution.unit_pixels();
        let mut prompt = request.prompt.clone();
        let mut payload = json!({
            "width": w * unit,
            "height": h * unit,
            "guidance_scale": request.guidance_scale,
            "num_inference_steps": request.num_inference_steps,
            "seed": -1,
            "scheduler": "DPMSolverMultistepScheduler",
            "safety_checker": true,
        });

        let references = http_urls(&request.reference_images);
        if !references.is_empty() {
            payload["init_images"] = json!(references);
            payload["strength"] = json!(0.8);

            let has_products = !request.product.product_images().is_empty();
            let conditioning = if has_products && !request.product.needs_model_generation() {
                prompt = format!(
                    "{}, professional photography, high quality, studio lighting, \
                     commercial product shot, detailed textures",
                    request.prompt
                );
                0.7
            } else if has_products {
                prompt = format!(
                    "professional model wearing {}, professional model, attractive person, \
                     natural pose, confident expression, studio lighting, commercial photography, \
                     high fashion",
                    request.prompt
                );
                0.5
            } else {
                0.6
            };
            payload["controlnet_conditioning_scale"] = json!(conditioning);
        }

        if is_product_prompt(&request.prompt) {
            payload["negative_prompt"] = json!(NEGATIVE_PROMPT);
            payload["clip_skip"] = json!(2);
        }
        payload["enable_attention_slicing"] = json!(true);
        payload["enable_cpu_offload"] = json!(false);
        payload["prompt"] = json!(prompt);
        payload
    }
}

fn is_product_prompt(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    PRODUCT_KEYWORDS.iter().any(|k| lower.contains(k))
}

#[async_trait]
impl ImageProvider for NanoBananaProvider {
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

        let (task_id, image_url) = if let Some(task_id) =
            response.get("task_id").and_then(Value::as_str)
        {
            let task_id = task_id.to_string();
            debug!(provider = %self.settings.kind, task_id = %task_id, "Generation task submitted");
            let url =
                http::poll_for_completion(&self.poll, &task_id, || self.get_status(&task_id))
                    .await?;
            (task_id, url)
        } else if let Some(url) = response.get("image_url").and_then(Value::as_str) {
            let task_id = response
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("sync")
                .to_string();
            (task_id, url.to_string())
        } else {
            return Err(ProviderError::MalformedResponse(
                "Unexpected response format from Nano Banana".to_string(),
            ));
        };

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
        Ok(http::parse_task_status(&body, &DONE_STATES, &FAILED_STATES))
    }

    async fn download_result(&self, image_url: &str) -> Result<Vec<u8>, ProviderError> {
        self.transport.get_bytes(image_url).await
    }
}
