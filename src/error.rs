//! Error types for AIBud
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for AIBud operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration loading, provider interactions, stream decoding,
/// state persistence, and billing.
#[derive(Error, Debug)]
pub enum AibudError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (request failures, non-2xx responses, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Search augmentation errors (Serper lookup failures)
    #[error("Search error: {0}")]
    Search(String),

    /// Persisted state errors (key-value store operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Billing errors (checkout session creation)
    #[error("Billing error: {0}")]
    Billing(String),

    /// Referenced chat does not exist in the store
    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    /// Referenced message does not exist within its chat
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// A stream is already active for this chat
    #[error("A response is already streaming for chat {0}")]
    InFlight(String),

    /// Monthly message limit reached for free-tier usage
    #[error("Message limit reached: limit={limit}, {message}")]
    UsageLimitReached {
        /// The configured monthly limit that was exceeded
        limit: u32,
        /// Additional message explaining the failure
        message: String,
    },

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for AIBud operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
