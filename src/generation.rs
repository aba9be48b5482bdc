//! Text-generation capability and its backends.
//!
//! Defines the [`TextGenerator`] trait and concrete implementations:
//! - **[`DisabledGenerator`]**: always fails; used when no model is configured.
//! - **[`OpenAICompatGenerator`]**: calls an OpenAI-compatible
//!   `POST /completions` endpoint (OpenAI, Ollama, vLLM, llama.cpp server).
//!
//! Callers go through [`Generator`], which validates the request before the
//! backend is touched and normalizes every failure into a
//! [`GenerationError`]. A `Generator` is built once at startup with
//! [`create_generator`] and owned by whoever serves chat requests.
//!
//! # Timeouts
//!
//! No timeout is applied unless `generation.timeout_secs` is set; a slow
//! model blocks only the request waiting on it.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::GenerationConfig;
use crate::error::GenerationError;

/// Parameters for one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_length: u32,
    /// Sample from the distribution instead of decoding greedily.
    pub do_sample: bool,
}

/// A backend that turns a prompt into one completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the model identifier (e.g. `"rinna/japanese-gpt2-small"`).
    fn model_name(&self) -> &str;

    /// Whether this backend can serve requests at all.
    fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Validating front for a [`TextGenerator`] backend.
pub struct Generator {
    backend: Box<dyn TextGenerator>,
    timeout: Option<Duration>,
}

impl Generator {
    pub fn new(backend: Box<dyn TextGenerator>) -> Self {
        Self {
            backend,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Generates one completion for `prompt`.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::InvalidRequest`] if `prompt` is blank or
    ///   `max_length` is zero; the backend is not called.
    /// - [`GenerationError::Timeout`] if a timeout is configured and expires.
    /// - Any backend error, or [`GenerationError::Backend`] for an empty completion.
    pub async fn generate(
        &self,
        prompt: &str,
        max_length: u32,
        do_sample: bool,
    ) -> Result<String, GenerationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::InvalidRequest(
                "prompt must not be empty".to_string(),
            ));
        }
        if max_length == 0 {
            return Err(GenerationError::InvalidRequest(
                "max_length must be > 0".to_string(),
            ));
        }

        let request = GenerationRequest {
            prompt: prompt.to_string(),
            max_length,
            do_sample,
        };
        debug!(model = self.model_name(), max_length, do_sample, "generating");

        let text = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.backend.complete(&request))
                .await
                .map_err(|_| GenerationError::Timeout(limit))??,
            None => self.backend.complete(&request).await?,
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::Backend(
                "model returned an empty completion".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

/// Builds the generator selected by `generation.provider`.
pub fn create_generator(config: &GenerationConfig) -> anyhow::Result<Generator> {
    let backend: Box<dyn TextGenerator> = match config.provider.as_str() {
        "disabled" => Box::new(DisabledGenerator),
        "openai" => Box::new(OpenAICompatGenerator::new(config)?),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    };

    let generator = Generator::new(backend);
    Ok(match config.timeout_secs {
        Some(secs) => generator.with_timeout(Duration::from_secs(secs)),
        None => generator,
    })
}

// ============ Disabled Generator ============

/// Backend used when `generation.provider = "disabled"`.
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn complete(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

// ============ OpenAI-compatible Generator ============

/// Backend calling `POST {base_url}/completions`.
///
/// Sends `OPENAI_API_KEY` as a bearer token when the variable is set; local
/// servers usually need none.
pub struct OpenAICompatGenerator {
    client: reqwest::Client,
    model: String,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAICompatGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for openai provider"))?;

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            model,
            endpoint: format!("{}/completions", config.base_url.trim_end_matches('/')),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAICompatGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": request.prompt,
            "max_tokens": request.max_length,
            "temperature": if request.do_sample { 1.0 } else { 0.0 },
        });

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| GenerationError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Backend(format!(
                "model API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Backend(e.to_string()))?;
        parse_completion_response(json)
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

/// Extracts `choices[0].text` from a completions response.
fn parse_completion_response(json: serde_json::Value) -> Result<String, GenerationError> {
    let parsed: CompletionResponse = serde_json::from_value(json)
        .map_err(|e| GenerationError::Backend(format!("malformed completion response: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.text)
        .ok_or_else(|| GenerationError::Backend("completion response had no choices".to_string()))
}
