//! Generative backend client.
//!
//! The pipeline talks to the backend through the [`Generator`] trait;
//! [`OllamaClient`] implements it against an Ollama-compatible
//! `/api/generate` endpoint.

use crate::config::GeneratorConfig;
use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Output format requested from the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
}

/// A single prompt sent to the generator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub response_format: Option<ResponseFormat>,
}

impl GenerationRequest {
    /// A prompt answered in free text.
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response_format: None,
        }
    }

    /// A prompt whose answer should be JSON.
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response_format: Some(ResponseFormat::Json),
        }
    }
}

/// Text generation capability used by the pipeline stages and the idea validator.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Send a prompt and return the raw response text.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;

    /// Model name for diagnostics and reports.
    fn model_name(&self) -> &str;
}

/// Ollama generate API request.
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama generate API response.
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Client for an Ollama-compatible generate endpoint.
pub struct OllamaClient {
    config: GeneratorConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    /// Create a client from explicit generator settings.
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        info!(
            "Initializing generator {} at {}",
            config.model, config.endpoint
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| GenerationError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let url = self.generate_url();

        let body = OllamaGenerateRequest {
            model: &self.config.model,
            prompt: &request.prompt,
            stream: false,
            format: request.response_format.map(|ResponseFormat::Json| "json"),
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending generate request ({} prompt chars)", request.prompt.len());

        let mut builder = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.config.timeout_ms)
            } else if e.is_connect() {
                GenerationError::Connect(self.config.endpoint.clone())
            } else {
                GenerationError::Request(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status, body });
        }

        let generated: OllamaGenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.config.timeout_ms)
            } else {
                GenerationError::malformed(format!("unreadable generator envelope: {}", e))
            }
        })?;

        debug!("Received {} response chars", generated.response.len());
        Ok(generated.response)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
