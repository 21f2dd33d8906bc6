//! AIBud - Streaming AI chat client
//!
//! AIBud is a terminal chat client that streams tokens from local Ollama
//! models or OpenAI-compatible endpoints. It keeps multiple chats with
//! local SQLite persistence, supports personas, optional web search
//! augmentation via Serper, a free-tier monthly message limit, and a
//! Stripe-backed billing server for Pro upgrades.

pub mod billing;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod personas;
pub mod providers;
pub mod search;
pub mod session;
pub mod storage;
pub mod store;
pub mod stream;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{AibudError, Result};
pub use personas::Persona;
pub use providers::{create_provider, GenerateRequest, ModelInfo, Provider};
pub use session::{ChatSession, SendOutcome};
pub use storage::KvStorage;
pub use store::{Chat, ChatStore, ChatUsage, Message, Role};
pub use stream::{StreamFraming, StreamOutcome};
