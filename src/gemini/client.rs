use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{GenerateContentRequest, GenerateContentResponse, Part};
use super::{ModelBackend, ModelRole};
use crate::config::{GeminiConfig, RequestConfig};
use crate::error::{GeminiError, GeminiResult};

/// Upper bound on the wait between two attempts.
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Exponential backoff before attempt `retry` (1-based), capped at
/// [`MAX_RETRY_DELAY_MS`].
pub fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let ms = match 2_u64.checked_pow(retry.saturating_sub(1)) {
        Some(factor) => base_ms.saturating_mul(factor),
        None if base_ms == 0 => 0,
        None => u64::MAX,
    }
    .min(MAX_RETRY_DELAY_MS);
    Duration::from_millis(ms)
}

/// Client for the Gemini `generateContent` REST API
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    vision_model: String,
    reasoning_model: String,
    request_config: RequestConfig,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: &GeminiConfig, request_config: RequestConfig) -> GeminiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(GeminiError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            vision_model: config.vision_model.clone(),
            reasoning_model: config.reasoning_model.clone(),
            request_config,
        })
    }

    /// Call `generateContent` on the given model
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        let mut last_error = None;

        for retries in 0..=self.request_config.max_retries {
            if retries > 0 {
                let delay = backoff_delay(self.request_config.retry_delay_ms, retries);
                warn!(
                    model = %model,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying Gemini request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, request).await {
                Ok(response) => {
                    info!(
                        model = %model,
                        latency_ms = start.elapsed().as_millis(),
                        "Gemini call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        model = %model,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Gemini call failed"
                    );
                    // Single attempt: surface the original error untouched.
                    if self.request_config.max_retries == 0 {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(GeminiError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries: self.request_config.max_retries,
        })
    }

    /// Execute a single request (internal)
    async fn execute_request(
        &self,
        url: &str,
        request: &GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse> {
        debug!(
            parts = request.contents.iter().map(|c| c.parts.len()).sum::<usize>(),
            "Calling Gemini"
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeminiError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    GeminiError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GeminiError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Model name used for the given role
    pub fn model_for(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Vision => &self.vision_model,
            ModelRole::Reasoning => &self.reasoning_model,
        }
    }
}

#[async_trait]
impl ModelBackend for GeminiClient {
    async fn generate(&self, role: ModelRole, parts: Vec<Part>) -> GeminiResult<String> {
        let request = GenerateContentRequest::new(parts);
        let response = self.generate_content(self.model_for(role), &request).await?;
        response.text()
    }
}
