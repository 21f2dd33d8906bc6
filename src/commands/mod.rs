//! Command implementations for the AIBud CLI
//!
//! Each subcommand gets its own module: `chat` runs the interactive
//! streaming session, `models` lists provider models, and `serve` runs
//! the billing server. `special_commands` parses the slash commands
//! available inside the chat loop.

pub mod chat;
pub mod models;
pub mod serve;
pub mod special_commands;

pub use chat::run_chat;
pub use models::run_models;
pub use serve::run_serve;
pub use special_commands::{parse_special_command, CommandError, SpecialCommand};
