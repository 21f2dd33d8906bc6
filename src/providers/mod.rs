//! Provider module for AIBud
//!
//! This module contains the AI provider abstraction and implementations
//! for Ollama and OpenAI-compatible endpoints.

pub mod base;
pub mod ollama;
pub mod openai;

pub use base::{GenerateRequest, ModelInfo, Provider, SamplingOptions};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::config::ProviderConfig;
use crate::error::Result;

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration; `provider_type` selects "ollama" or
///   "openai" and the matching backend section supplies host, model, and key
///
/// # Returns
///
/// Returns a boxed provider instance
///
/// # Errors
///
/// Returns error if the provider type is unknown or initialization fails
/// (for OpenAI, a missing API key).
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    match config.provider_type.as_str() {
        "ollama" => Ok(Box::new(OllamaProvider::new(config.ollama.clone())?)),
        "openai" => Ok(Box::new(OpenAiProvider::new(config.openai.clone())?)),
        other => Err(crate::error::AibudError::Provider(format!(
            "Unknown provider type: {}",
            other
        ))
        .into()),
    }
}
