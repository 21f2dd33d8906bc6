//! OpenAI-compatible provider implementation for AIBud
//!
//! This module implements the Provider trait for hosted OpenAI-compatible
//! chat-completion APIs. Requests are bearer-authenticated and responses
//! stream as server-sent events terminated by a `data: [DONE]` sentinel.

use crate::config::OpenAiConfig;
use crate::error::{AibudError, Result};
use crate::providers::{GenerateRequest, ModelInfo, Provider};
use crate::store::Role;
use crate::stream::{run_token_stream, StreamFraming, StreamOutcome};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default API base for the hosted OpenAI endpoint
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Hosted OpenAI-compatible API provider
///
/// Requires an API key; the API base is overridable so tests can point the
/// provider at a mock server.
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

/// Request body for `/chat/completions`
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// Message structure for the chat-completions API
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from `/models`
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider instance
    ///
    /// # Errors
    ///
    /// Returns [`AibudError::MissingCredentials`] when no API key is
    /// configured, or a provider error if HTTP client initialization fails.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.as_deref().unwrap_or("").is_empty() {
            return Err(AibudError::MissingCredentials("openai".to_string()).into());
        }

        let client = Client::builder()
            .user_agent("aibud/0.2.0")
            .build()
            .map_err(|e| AibudError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized OpenAI provider: model={}", config.model);

        Ok(Self { client, config })
    }

    fn api_base(&self) -> &str {
        self.config.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    fn api_key(&self) -> &str {
        self.config.api_key.as_deref().unwrap_or_default()
    }

    /// Convert a generation request into the chat-completions message list
    ///
    /// The persona text becomes the system message, with any search context
    /// appended to it; empty assistant placeholders are omitted.
    fn convert_messages(request: &GenerateRequest) -> Vec<ChatMessage> {
        let mut system = request.persona.system_prompt().to_string();
        if let Some(context) = &request.search_context {
            system.push_str("\n\nWeb Search Results (for context):\n");
            system.push_str(context);
        }

        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: system,
        }];

        for msg in &request.history {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant if !msg.content.is_empty() => "assistant",
                Role::Assistant => continue,
            };
            messages.push(ChatMessage {
                role: role.to_string(),
                content: msg.content.clone(),
            });
        }

        messages
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn generate(
        &self,
        request: &GenerateRequest,
        token_tx: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Result<StreamOutcome> {
        let url = format!("{}/chat/completions", self.api_base());

        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(request),
            stream: true,
        };

        tracing::debug!(
            "Sending chat-completion request: model={}, {} messages",
            body.model,
            body.messages.len()
        );

        let send = self
            .client
            .post(&url)
            .bearer_auth(self.api_key())
            .json(&body)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("OpenAI request cancelled before response");
                return Ok(StreamOutcome::Cancelled);
            }
            result = send => result.map_err(|e| {
                tracing::error!("OpenAI request failed: {}", e);
                AibudError::Provider(format!("OpenAI request failed: {}", e))
            })?,
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI returned error {}: {}", status, error_text);
            return Err(AibudError::Provider(format!(
                "OpenAI returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        run_token_stream(
            response.bytes_stream(),
            StreamFraming::Sse,
            token_tx,
            cancel,
        )
        .await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.api_base());
        tracing::debug!("Fetching models from OpenAI: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.api_key())
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to fetch OpenAI models: {}", e);
                AibudError::Provider(format!("Failed to fetch models: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI returned error {}: {}", status, error_text);
            return Err(AibudError::Provider(format!(
                "OpenAI returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let models: ModelsResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse OpenAI models response: {}", e);
            AibudError::Provider(format!("Failed to parse models response: {}", e))
        })?;

        Ok(models
            .data
            .into_iter()
            .map(|entry| ModelInfo::new(entry.id))
            .collect())
    }

    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personas::Persona;
    use crate::store::Message;

    fn test_config() -> OpenAiConfig {
        OpenAiConfig {
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o-mini".to_string(),
            api_base: None,
        }
    }

    #[test]
    fn test_openai_provider_creation() {
        let provider = OpenAiProvider::new(test_config());
        assert!(provider.is_ok());
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let config = OpenAiConfig {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            api_base: None,
        };
        let result = OpenAiProvider::new(config);
        assert!(result.is_err());

        let config = OpenAiConfig {
            api_key: Some(String::new()),
            model: "gpt-4o-mini".to_string(),
            api_base: None,
        };
        assert!(OpenAiProvider::new(config).is_err());
    }

    #[test]
    fn test_openai_provider_identity() {
        let provider = OpenAiProvider::new(test_config()).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_api_base_defaults_to_hosted_endpoint() {
        let provider = OpenAiProvider::new(test_config()).unwrap();
        assert_eq!(provider.api_base(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_api_base_override() {
        let mut config = test_config();
        config.api_base = Some("http://localhost:9000/v1".to_string());
        let provider = OpenAiProvider::new(config).unwrap();
        assert_eq!(provider.api_base(), "http://localhost:9000/v1");
    }

    #[test]
    fn test_convert_messages_system_first() {
        let request = GenerateRequest {
            persona: Persona::Casual,
            search_context: None,
            history: vec![Message::user("Hello")],
        };
        let messages = OpenAiProvider::convert_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, Persona::Casual.system_prompt());
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "Hello");
    }

    #[test]
    fn test_convert_messages_appends_search_context_to_system() {
        let request = GenerateRequest {
            persona: Persona::Professional,
            search_context: Some("Title: x".to_string()),
            history: vec![Message::user("q")],
        };
        let messages = OpenAiProvider::convert_messages(&request);
        assert!(messages[0].content.contains("Web Search Results"));
        assert!(messages[0].content.contains("Title: x"));
    }

    #[test]
    fn test_convert_messages_skips_empty_assistant() {
        let mut filled = Message::assistant_placeholder();
        filled.content = "answer".to_string();
        let request = GenerateRequest {
            persona: Persona::Professional,
            search_context: None,
            history: vec![
                Message::user("q1"),
                Message::assistant_placeholder(),
                Message::user("q2"),
                filled,
            ],
        };
        let messages = OpenAiProvider::convert_messages(&request);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "user", "assistant"]);
    }

    #[test]
    fn test_chat_completion_request_serializes_stream_flag() {
        let body = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            stream: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_models_response_parses() {
        let json = r#"{"object":"list","data":[{"id":"gpt-4o-mini","object":"model"}]}"#;
        let models: ModelsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(models.data.len(), 1);
        assert_eq!(models.data[0].id, "gpt-4o-mini");
    }
}
