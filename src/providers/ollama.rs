//! Ollama provider implementation for AIBud
//!
//! This module implements the Provider trait for Ollama, connecting to a
//! local or remote Ollama server and streaming generation tokens back as
//! newline-delimited JSON. Includes model listing via `/api/tags`.

use crate::config::OllamaConfig;
use crate::error::{AibudError, Result};
use crate::providers::{GenerateRequest, ModelInfo, Provider, SamplingOptions};
use crate::stream::{run_token_stream, StreamFraming, StreamOutcome};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Ollama API provider
///
/// Connects to an Ollama server (local or remote) and streams completions
/// from `/api/generate`. No credential is required.
///
/// # Examples
///
/// ```no_run
/// use aibud::config::OllamaConfig;
/// use aibud::providers::{OllamaProvider, Provider};
///
/// let config = OllamaConfig {
///     host: "http://localhost:11434".to_string(),
///     model: "gemma:2b".to_string(),
/// };
/// let provider = OllamaProvider::new(config).unwrap();
/// assert_eq!(provider.name(), "ollama");
/// ```
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
    options: SamplingOptions,
}

/// Request body for `/api/generate`
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: SamplingOptions,
}

/// Response from `/api/tags`
#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

/// Model metadata from `/api/tags`
#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
    #[serde(default)]
    size: u64,
}

impl OllamaProvider {
    /// Create a new Ollama provider instance
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("aibud/0.2.0")
            .build()
            .map_err(|e| AibudError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Ollama provider: host={}, model={}",
            config.host,
            config.model
        );

        Ok(Self {
            client,
            config,
            options: SamplingOptions::default(),
        })
    }

    /// Get the configured Ollama host
    pub fn host(&self) -> &str {
        &self.config.host
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn generate(
        &self,
        request: &GenerateRequest,
        token_tx: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Result<StreamOutcome> {
        let url = format!("{}/api/generate", self.config.host);

        let body = OllamaGenerateRequest {
            model: self.config.model.clone(),
            prompt: request.flatten_prompt(),
            stream: true,
            options: self.options,
        };

        tracing::debug!(
            "Sending Ollama generate request: model={}, prompt_len={}",
            body.model,
            body.prompt.len()
        );

        let send = self.client.post(&url).json(&body).send();
        let response = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Ollama request cancelled before response");
                return Ok(StreamOutcome::Cancelled);
            }
            result = send => result.map_err(|e| {
                tracing::error!("Ollama request failed: {}", e);
                AibudError::Provider(format!("Ollama request failed: {}", e))
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(AibudError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        run_token_stream(
            response.bytes_stream(),
            StreamFraming::Ndjson,
            token_tx,
            cancel,
        )
        .await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.config.host);
        tracing::debug!("Fetching models from Ollama: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::warn!("Failed to fetch Ollama models: {}", e);
            AibudError::Provider(format!("Failed to connect to Ollama server: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, error_text);
            return Err(AibudError::Provider(format!(
                "Ollama returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let tags: OllamaTagsResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama tags response: {}", e);
            AibudError::Provider(format!("Failed to parse Ollama response: {}", e))
        })?;

        let models = tags
            .models
            .into_iter()
            .map(|tag| ModelInfo {
                name: tag.name,
                size: tag.size,
            })
            .collect::<Vec<_>>();

        tracing::debug!("Fetched {} models from Ollama", models.len());
        Ok(models)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }
}
