//! Configuration management for AIBud
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{AibudError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for AIBud
///
/// This structure holds all configuration needed by the chat client,
/// including provider settings, web search, and the billing server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider configuration (Ollama, OpenAI)
    pub provider: ProviderConfig,

    /// Web search augmentation configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Billing server configuration
    #[serde(default)]
    pub billing: BillingConfig,
}

/// Provider configuration
///
/// Specifies which AI provider to use and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use ("ollama" or "openai")
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI configuration
    #[serde(default)]
    pub openai: OpenAiConfig,
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "gemma:2b".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key; prefer the OPENAI_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model to use
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Optional API base URL (useful for tests and compatible endpoints)
    ///
    /// When set, this base is used to build the `/chat/completions` and
    /// `/models` endpoints, which allows tests to point the provider at a
    /// mock server.
    #[serde(default)]
    pub api_base: Option<String>,
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_openai_model(),
            api_base: None,
        }
    }
}

/// Web search configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchConfig {
    /// Whether search augmentation is on by default
    #[serde(default)]
    pub enabled: bool,

    /// Serper API key; prefer the SERPER_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    /// Optional search endpoint override (useful for tests)
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Billing server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Port the billing server listens on
    #[serde(default = "default_billing_port")]
    pub port: u16,

    /// Stripe secret key; prefer the STRIPE_SECRET_KEY environment variable
    #[serde(default)]
    pub stripe_secret_key: Option<String>,

    /// Stripe price ID for the Pro subscription
    #[serde(default = "default_price_id")]
    pub price_id: String,

    /// Base URL the browser returns to after checkout
    #[serde(default = "default_return_url")]
    pub return_url: String,

    /// Optional Stripe API base override (useful for tests)
    #[serde(default)]
    pub stripe_api_base: Option<String>,
}

fn default_billing_port() -> u16 {
    4242
}

fn default_price_id() -> String {
    "price_aibud_pro_monthly".to_string()
}

fn default_return_url() -> String {
    // The billing server itself handles the checkout return, so the default
    // points back at it.
    "http://localhost:4242".to_string()
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            port: default_billing_port(),
            stripe_secret_key: None,
            price_id: default_price_id(),
            return_url: default_return_url(),
            stripe_api_base: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            provider: ProviderConfig {
                provider_type: "ollama".to_string(),
                ollama: OllamaConfig::default(),
                openai: OpenAiConfig::default(),
            },
            search: SearchConfig::default(),
            billing: BillingConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AibudError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| AibudError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(provider_type) = std::env::var("AIBUD_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(ollama_host) = std::env::var("AIBUD_OLLAMA_HOST") {
            self.provider.ollama.host = ollama_host;
        }

        if let Ok(ollama_model) = std::env::var("AIBUD_OLLAMA_MODEL") {
            self.provider.ollama.model = ollama_model;
        }

        if let Ok(openai_model) = std::env::var("AIBUD_OPENAI_MODEL") {
            self.provider.openai.model = openai_model;
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            self.provider.openai.api_key = Some(api_key);
        }

        if let Ok(serper_key) = std::env::var("SERPER_API_KEY") {
            self.search.api_key = Some(serper_key);
        }

        if let Ok(stripe_key) = std::env::var("STRIPE_SECRET_KEY") {
            self.billing.stripe_secret_key = Some(stripe_key);
        }

        if let Ok(port) = std::env::var("AIBUD_BILLING_PORT") {
            if let Ok(value) = port.parse() {
                self.billing.port = value;
            } else {
                tracing::warn!("Invalid AIBUD_BILLING_PORT: {}", port);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(provider) = &cli.provider {
            self.provider.provider_type = provider.clone();
        }

        if let Some(model) = &cli.model {
            match self.provider.provider_type.as_str() {
                "openai" => self.provider.openai.model = model.clone(),
                _ => self.provider.ollama.model = model.clone(),
            }
        }

        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set.
    ///
    /// # Returns
    ///
    /// Returns Ok if configuration is valid
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(AibudError::Config("Provider type cannot be empty".to_string()).into());
        }

        let valid_providers = ["ollama", "openai"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(AibudError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        if self.provider.ollama.host.is_empty() {
            return Err(AibudError::Config("Ollama host cannot be empty".to_string()).into());
        }

        if self.billing.port == 0 {
            return Err(AibudError::Config("billing.port must be non-zero".to_string()).into());
        }

        if self.billing.price_id.is_empty() {
            return Err(AibudError::Config("billing.price_id cannot be empty".to_string()).into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.provider_type, "ollama");
        assert_eq!(config.provider.ollama.host, "http://localhost:11434");
        assert_eq!(config.billing.port, 4242);
        assert!(!config.search.enabled);
    }

    #[test]
    fn test_config_validation_success() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_provider() {
        let mut config = Config::default();
        config.provider.provider_type = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_provider() {
        let mut config = Config::default();
        config.provider.provider_type = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_ollama_host() {
        let mut config = Config::default();
        config.provider.ollama.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_billing_port() {
        let mut config = Config::default();
        config.billing.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
provider:
  type: openai
  ollama:
    host: http://localhost:11434
    model: gemma:2b
  openai:
    model: gpt-4o
    api_base: http://localhost:9000/v1

search:
  enabled: true
  api_key: serper-key

billing:
  port: 4242
  price_id: price_test
  return_url: http://localhost:3000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider.provider_type, "openai");
        assert_eq!(config.provider.openai.model, "gpt-4o");
        assert_eq!(
            config.provider.openai.api_base.as_deref(),
            Some("http://localhost:9000/v1")
        );
        assert!(config.search.enabled);
        assert_eq!(config.billing.price_id, "price_test");
    }

    #[test]
    fn test_config_from_yaml_minimal() {
        let yaml = r#"
provider:
  type: ollama
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.provider.ollama.model, "gemma:2b");
        assert_eq!(config.provider.openai.model, "gpt-4o-mini");
        assert_eq!(config.billing.port, 4242);
    }

    #[test]
    fn test_billing_config_defaults() {
        let billing = BillingConfig::default();
        assert_eq!(billing.port, 4242);
        assert_eq!(billing.return_url, "http://localhost:4242");
        assert!(billing.stripe_secret_key.is_none());
        assert!(billing.stripe_api_base.is_none());
    }

    #[test]
    fn test_search_config_defaults() {
        let search = SearchConfig::default();
        assert!(!search.enabled);
        assert!(search.api_key.is_none());
    }

    #[test]
    fn test_load_nonexistent_file_uses_defaults() {
        let cli = crate::cli::Cli {
            config: None,
            verbose: false,
            provider: None,
            model: None,
            command: crate::cli::Commands::Models,
        };

        let config = Config::load("nonexistent.yaml", &cli).unwrap();
        assert_eq!(config.provider.provider_type, "ollama");
    }

    #[test]
    fn test_cli_overrides_provider_and_model() {
        let cli = crate::cli::Cli {
            config: None,
            verbose: false,
            provider: Some("openai".to_string()),
            model: Some("gpt-4o".to_string()),
            command: crate::cli::Commands::Models,
        };

        let mut config = Config::default();
        config.apply_cli_overrides(&cli);
        assert_eq!(config.provider.provider_type, "openai");
        assert_eq!(config.provider.openai.model, "gpt-4o");
        // The Ollama model is untouched when the active provider is OpenAI.
        assert_eq!(config.provider.ollama.model, "gemma:2b");
    }

    #[test]
    fn test_example_config_parses() {
        // Ensure the example configuration file is valid YAML and maps to `Config`.
        let contents = std::fs::read_to_string("config/config.yaml")
            .expect("Failed to read example config/config.yaml");
        let cfg: Config = serde_yaml::from_str(&contents).expect("Failed to parse example config");

        assert_eq!(cfg.provider.provider_type, "ollama");
        assert!(cfg.validate().is_ok());
    }
}
