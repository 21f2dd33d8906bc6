//! Provider abstraction for AIBud
//!
//! This module defines the trait implemented by inference backends along with
//! the request, sampling, and model-metadata types shared between them.

use crate::error::Result;
use crate::personas::Persona;
use crate::store::{Message, Role};
use crate::stream::StreamOutcome;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A generation request assembled by the session layer
///
/// Each provider renders this into its own wire shape: Ollama flattens it
/// into a single prompt string, while OpenAI-compatible APIs send a
/// structured message list.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Persona controlling the system-prompt text
    pub persona: Persona,
    /// Pre-formatted web search results to prepend as context, if any
    pub search_context: Option<String>,
    /// Conversation history including the just-sent user message
    pub history: Vec<Message>,
}

impl GenerateRequest {
    /// Flatten the request into a single prompt string
    ///
    /// Produces the persona instructions, optional search-results block, and
    /// a `User:`/`Assistant:` transcript, ending with an `Assistant:` cue.
    /// Assistant messages with empty content (unfilled placeholders) are
    /// omitted from the transcript.
    ///
    /// # Examples
    ///
    /// ```
    /// use aibud::personas::Persona;
    /// use aibud::providers::GenerateRequest;
    /// use aibud::store::Message;
    ///
    /// let request = GenerateRequest {
    ///     persona: Persona::Professional,
    ///     search_context: None,
    ///     history: vec![Message::user("Hello")],
    /// };
    /// let prompt = request.flatten_prompt();
    /// assert!(prompt.contains("User: Hello"));
    /// assert!(prompt.ends_with("Assistant:"));
    /// ```
    pub fn flatten_prompt(&self) -> String {
        let transcript: Vec<String> = self
            .history
            .iter()
            .filter_map(|msg| match msg.role {
                Role::User => Some(format!("User: {}", msg.content)),
                Role::Assistant if !msg.content.is_empty() => {
                    Some(format!("Assistant: {}", msg.content))
                }
                Role::Assistant => None,
            })
            .collect();

        let search_block = match &self.search_context {
            Some(results) => format!("\nWeb Search Results (for context):\n{}\n", results),
            None => String::new(),
        };

        format!(
            "{}\n{}\nConversation History:\n{}\n\nAssistant:",
            self.persona.system_prompt(),
            search_block,
            transcript.join("\n\n")
        )
    }
}

/// Sampling options sent with every Ollama generate request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SamplingOptions {
    /// Maximum tokens to generate
    pub num_predict: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
    /// Top-k sampling cutoff
    pub top_k: u32,
    /// Repetition penalty
    pub repeat_penalty: f32,
    /// Sampling seed for reproducible output
    pub seed: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            num_predict: 512,
            temperature: 0.7,
            top_p: 0.9,
            top_k: 40,
            repeat_penalty: 1.1,
            seed: 42,
        }
    }
}

/// Metadata for an available model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier usable in requests
    pub name: String,
    /// Reported size in bytes, when the backend provides one
    #[serde(default)]
    pub size: u64,
}

impl ModelInfo {
    /// Create model metadata with a name only
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
        }
    }

    /// Format the reported size for display
    ///
    /// # Examples
    ///
    /// ```
    /// use aibud::providers::ModelInfo;
    ///
    /// let mut info = ModelInfo::new("gemma:2b");
    /// info.size = 1_048_576;
    /// assert_eq!(info.display_size(), "1.0MB");
    /// ```
    pub fn display_size(&self) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
        let mut size = self.size as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.1}{}", size, UNITS[unit_idx])
    }
}

/// An AI inference backend that streams completion tokens
///
/// Implementations build the outgoing request for their wire protocol, issue
/// it, and feed the response body through the stream decoder, pushing each
/// decoded token to `token_tx`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stream a completion for the request
    ///
    /// Tokens are delivered through `token_tx` as they decode. A non-2xx
    /// response or transport failure is an error; cancellation via `cancel`
    /// is a normal [`StreamOutcome::Cancelled`] outcome.
    async fn generate(
        &self,
        request: &GenerateRequest,
        token_tx: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Result<StreamOutcome>;

    /// List models available from this backend
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;

    /// Short provider identifier ("ollama" or "openai")
    fn name(&self) -> &'static str;

    /// The model currently targeted by requests
    fn model(&self) -> String;
}
