//! Web search augmentation for AIBud
//!
//! This module queries the Serper API and formats the top organic results
//! into a context block for the prompt. Search failures are reported to the
//! caller but are expected to be treated as non-fatal: a chat turn proceeds
//! without augmentation when search is unavailable.

use crate::config::SearchConfig;
use crate::error::{AibudError, Result};

use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Default Serper search endpoint
pub const DEFAULT_ENDPOINT: &str = "https://google.serper.dev/search";

/// Number of organic results included in the context block
pub const RESULT_LIMIT: usize = 5;

/// Client for the Serper web search API
pub struct SearchClient {
    client: Client,
    config: SearchConfig,
}

/// Request body for the Serper search endpoint
#[derive(Debug, Serialize)]
struct SearchRequest {
    q: String,
}

/// Response from the Serper search endpoint
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

/// A single organic search result
#[derive(Debug, Clone, Deserialize)]
pub struct OrganicResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

impl SearchClient {
    /// Create a new search client
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("aibud/0.2.0")
            .build()
            .map_err(|e| AibudError::Search(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Toggle search augmentation for subsequent queries
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Whether search augmentation is enabled and usable
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.api_key.as_deref().unwrap_or("").is_empty()
    }

    fn endpoint(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    /// Search the web and return a formatted context block
    ///
    /// Returns `Ok(None)` when search is disabled or no API key is
    /// configured. The caller decides whether a search error aborts the
    /// turn; the session layer logs it and continues without context.
    ///
    /// # Errors
    ///
    /// Returns [`AibudError::Search`] on transport failure, a non-2xx
    /// response, or an unparseable body.
    pub async fn search(&self, query: &str) -> Result<Option<String>> {
        if !self.is_enabled() {
            tracing::debug!("Web search disabled, skipping augmentation");
            return Ok(None);
        }

        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        tracing::debug!("Searching the web: query_len={}", query.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("X-API-KEY", api_key)
            .json(&SearchRequest {
                q: query.to_string(),
            })
            .send()
            .await
            .map_err(|e| AibudError::Search(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(
                AibudError::Search(format!("Search returned error {}: {}", status, error_text))
                    .into(),
            );
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AibudError::Search(format!("Failed to parse search response: {}", e)))?;

        if body.organic.is_empty() {
            tracing::debug!("Search returned no organic results");
            return Ok(None);
        }

        Ok(Some(format_results(&body.organic)))
    }
}

/// Format the top organic results into a context block
///
/// Each result renders as Title/Link/Snippet lines; results are joined with
/// a `---` separator. Only the first [`RESULT_LIMIT`] results are included.
pub fn format_results(results: &[OrganicResult]) -> String {
    results
        .iter()
        .take(RESULT_LIMIT)
        .map(|r| {
            format!(
                "Title: {}\nLink: {}\nSnippet: {}",
                r.title, r.link, r.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(n: usize) -> OrganicResult {
        OrganicResult {
            title: format!("Result {}", n),
            link: format!("https://example.com/{}", n),
            snippet: format!("Snippet {}", n),
        }
    }

    #[test]
    fn test_format_results_single() {
        let formatted = format_results(&[result(1)]);
        assert_eq!(
            formatted,
            "Title: Result 1\nLink: https://example.com/1\nSnippet: Snippet 1"
        );
    }

    #[test]
    fn test_format_results_separator() {
        let formatted = format_results(&[result(1), result(2)]);
        assert!(formatted.contains("\n\n---\n\n"));
        assert_eq!(formatted.matches("---").count(), 1);
    }

    #[test]
    fn test_format_results_caps_at_limit() {
        let results: Vec<OrganicResult> = (0..8).map(result).collect();
        let formatted = format_results(&results);
        assert!(formatted.contains("Result 4"));
        assert!(!formatted.contains("Result 5"));
    }

    #[test]
    fn test_search_disabled_without_key() {
        let client = SearchClient::new(SearchConfig {
            enabled: true,
            api_key: None,
            endpoint: None,
        })
        .unwrap();
        assert!(!client.is_enabled());
    }

    #[test]
    fn test_search_disabled_by_flag() {
        let client = SearchClient::new(SearchConfig {
            enabled: false,
            api_key: Some("key".to_string()),
            endpoint: None,
        })
        .unwrap();
        assert!(!client.is_enabled());
    }

    #[test]
    fn test_search_enabled_with_key() {
        let client = SearchClient::new(SearchConfig {
            enabled: true,
            api_key: Some("key".to_string()),
            endpoint: None,
        })
        .unwrap();
        assert!(client.is_enabled());
        assert_eq!(client.endpoint(), DEFAULT_ENDPOINT);
    }

    #[tokio::test]
    async fn test_search_skips_when_disabled() {
        let client = SearchClient::new(SearchConfig::default()).unwrap();
        let context = client.search("anything").await.unwrap();
        assert!(context.is_none());
    }

    #[test]
    fn test_search_response_parses_organic() {
        let json = r#"{"organic":[{"title":"T","link":"L","snippet":"S","position":1}]}"#;
        let body: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.organic.len(), 1);
        assert_eq!(body.organic[0].title, "T");
    }

    #[test]
    fn test_search_response_tolerates_missing_fields() {
        let body: SearchResponse = serde_json::from_str(r#"{"organic":[{}]}"#).unwrap();
        assert_eq!(body.organic[0].title, "");
    }
}
