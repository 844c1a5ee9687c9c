//! Gemini (Google) image generation provider.

use crate::config::resolve_api_key;
use crate::error::{parse_retry_after, sanitize_error_message, NanoBatchError, Result};
use crate::image::provider::{ImageProvider, ProviderFactory};
use crate::image::types::{GenerationResult, OutputConfig, ResponsePart};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Model used for every request: Nano Banana Pro (Gemini 3 Pro Image preview).
pub const MODEL_ID: &str = "gemini-3-pro-image-preview";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `GEMINI_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL (e.g. for a proxy).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<GeminiProvider> {
        let api_key =
            resolve_api_key(self.api_key.as_deref()).ok_or(NanoBatchError::MissingApiKey)?;

        Ok(GeminiProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

impl ProviderFactory for GeminiProviderBuilder {
    fn connect(&self, api_key: &str) -> Result<Arc<dyn ImageProvider>> {
        let provider = self.clone().api_key(api_key).build()?;
        Ok(Arc::new(provider))
    }
}

/// Gemini image generation provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    async fn generate_impl(&self, prompt: &str, config: &OutputConfig) -> Result<GenerationResult> {
        let start = Instant::now();

        let url = format!("{}/models/{}:generateContent", self.base_url, MODEL_ID);
        let body = GeminiRequest::new(prompt, config);

        tracing::debug!(
            model = MODEL_ID,
            aspect_ratio = %config.aspect_ratio,
            resolution = %config.resolution,
            "sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let result = gemini_response.into_result()?;

        tracing::debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            parts = result.parts.len(),
            images = result.image_count(),
            "Gemini generation complete"
        );

        Ok(result)
    }
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> NanoBatchError {
    let text = sanitize_error_message(text);
    if status == 402 {
        return NanoBatchError::Billing(
            "Gemini billing issue: enable billing at https://aistudio.google.com".into(),
        );
    }
    if status == 404 {
        return NanoBatchError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
        return NanoBatchError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return NanoBatchError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return NanoBatchError::ContentBlocked(text);
    }
    NanoBatchError::Api {
        status,
        message: text,
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, prompt: &str, config: &OutputConfig) -> Result<GenerationResult> {
        self.generate_impl(prompt, config).await
    }

    fn model(&self) -> &str {
        MODEL_ID
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
struct GeminiRequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    image_config: GeminiImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: &'static str,
    image_size: &'static str,
}

impl GeminiRequest {
    fn new(prompt: &str, config: &OutputConfig) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiRequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: GeminiImageConfig {
                    aspect_ratio: config.aspect_ratio.as_str(),
                    image_size: config.resolution.as_str(),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GeminiResponse {
    fn into_result(self) -> Result<GenerationResult> {
        // Prompt-level blocks come back as HTTP 200
        if let Some(feedback) = self.prompt_feedback {
            if let Some(reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(NanoBatchError::ContentBlocked(msg));
            }
        }

        let Some(candidate) = self.candidates.into_iter().next() else {
            return Ok(GenerationResult::default());
        };

        let parts = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .map(GeminiPartResponse::into_part)
            .collect::<Result<Vec<_>>>()?;

        Ok(GenerationResult {
            parts,
            finish_reason: candidate.finish_reason,
        })
    }
}

impl GeminiPartResponse {
    fn into_part(self) -> Result<ResponsePart> {
        if let Some(inline) = self.inline_data {
            let data = base64::engine::general_purpose::STANDARD
                .decode(&inline.data)
                .map_err(|e| NanoBatchError::Decode(e.to_string()))?;
            return Ok(ResponsePart::Image {
                mime_type: inline.mime_type,
                data,
            });
        }
        match self.text {
            Some(text) if !self.thought && !text.is_empty() => Ok(ResponsePart::Text(text)),
            _ => Ok(ResponsePart::Other),
        }
    }
}
