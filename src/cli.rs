//! Command-line interface definition for AIBud
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for interactive chat, model listing, and the
//! billing server.

use clap::{Parser, Subcommand};

/// AIBud - Streaming AI chat client
///
/// Chat with local Ollama models or OpenAI-compatible endpoints,
/// with streaming responses, personas, and optional web search.
#[derive(Parser, Debug, Clone)]
#[command(name = "aibud")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the provider from config (ollama, openai)
    #[arg(short, long, global = true)]
    pub provider: Option<String>,

    /// Override the model for the active provider
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for AIBud
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Enable web search augmentation for this session
        #[arg(short, long)]
        search: bool,
    },

    /// List models available from the active provider
    Models,

    /// Run the billing server for Pro upgrades
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            provider: None,
            model: None,
            command: Commands::Chat { search: false },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Chat { search: false }));
    }

    #[test]
    fn test_cli_parse_chat_command() {
        let cli = Cli::try_parse_from(["aibud", "chat"]);
        assert!(cli.is_ok());
        let cli = cli.unwrap();
        assert!(matches!(cli.command, Commands::Chat { search: false }));
    }

    #[test]
    fn test_cli_parse_chat_with_search() {
        let cli = Cli::try_parse_from(["aibud", "chat", "--search"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { search: true }));
    }

    #[test]
    fn test_cli_parse_chat_with_provider_override() {
        let cli = Cli::try_parse_from(["aibud", "chat", "--provider", "openai"]).unwrap();
        assert_eq!(cli.provider, Some("openai".to_string()));
    }

    #[test]
    fn test_cli_parse_chat_with_model_override() {
        let cli = Cli::try_parse_from(["aibud", "chat", "--model", "llama3.2:1b"]).unwrap();
        assert_eq!(cli.model, Some("llama3.2:1b".to_string()));
    }

    #[test]
    fn test_cli_parse_models() {
        let cli = Cli::try_parse_from(["aibud", "models"]).unwrap();
        assert!(matches!(cli.command, Commands::Models));
    }

    #[test]
    fn test_cli_parse_models_with_global_provider() {
        let cli = Cli::try_parse_from(["aibud", "models", "--provider", "ollama"]).unwrap();
        assert!(matches!(cli.command, Commands::Models));
        assert_eq!(cli.provider, Some("ollama".to_string()));
    }

    #[test]
    fn test_cli_parse_serve() {
        let cli = Cli::try_parse_from(["aibud", "serve"]).unwrap();
        if let Commands::Serve { port } = cli.command {
            assert_eq!(port, None);
        } else {
            panic!("Expected Serve command");
        }
    }

    #[test]
    fn test_cli_parse_serve_with_port() {
        let cli = Cli::try_parse_from(["aibud", "serve", "--port", "8080"]).unwrap();
        if let Commands::Serve { port } = cli.command {
            assert_eq!(port, Some(8080));
        } else {
            panic!("Expected Serve command");
        }
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::try_parse_from(["aibud", "--config", "custom.yaml", "models"]).unwrap();
        assert_eq!(cli.config, Some("custom.yaml".to_string()));
    }

    #[test]
    fn test_cli_parse_with_verbose() {
        let cli = Cli::try_parse_from(["aibud", "-v", "models"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_parse_missing_command() {
        assert!(Cli::try_parse_from(["aibud"]).is_err());
    }

    #[test]
    fn test_cli_parse_invalid_command() {
        assert!(Cli::try_parse_from(["aibud", "invalid"]).is_err());
    }
}
