use async_trait::async_trait;
use texforge_core::prompts::{base_prompt, derived_instruction};
use texforge_core::{GenerationError, Generator, ImageData, OutputKind};

use crate::config::GeminiConfig;
use crate::wire::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};

/// Longest slice of an error body carried into the error message.
const ERROR_BODY_EXCERPT: usize = 300;

/// Stateless wrapper around `models/{model}:generateContent`.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: GeminiConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// One round trip. `kind` only labels the result for error reporting.
    async fn generate(&self, parts: Vec<Part>, kind: OutputKind) -> Result<ImageData, GenerationError> {
        let req = GenerateContentRequest {
            contents: vec![Content { role: None, parts }],
            generation_config: GenerationConfig::image(&self.config.aspect_ratio),
        };

        tracing::debug!(%kind, model = %self.config.model, "generateContent");
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| GenerationError::GenerationFailed(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| GenerationError::GenerationFailed(format!("read response: {e}")))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let excerpt: String = text.chars().take(ERROR_BODY_EXCERPT).collect();
            return Err(GenerationError::GenerationFailed(format!(
                "service returned {status}: {excerpt}"
            )));
        }

        let parsed: GenerateContentResponse = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(%kind, error = %e, "malformed generateContent response");
                return Err(GenerationError::NoImageProduced { kind });
            }
        };

        parsed
            .first_image()
            .ok_or(GenerationError::NoImageProduced { kind })
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate_base(&self, prompt: &str) -> Result<ImageData, GenerationError> {
        self.generate(vec![Part::text(base_prompt(prompt))], OutputKind::Albedo)
            .await
    }

    async fn generate_derived(
        &self,
        base: &ImageData,
        kind: OutputKind,
    ) -> Result<ImageData, GenerationError> {
        let instruction = derived_instruction(kind).ok_or_else(|| {
            GenerationError::GenerationFailed(format!("{kind} is not a derived map"))
        })?;
        self.generate(vec![Part::image(base), Part::text(instruction)], kind)
            .await
    }
}
