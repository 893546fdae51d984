//! Web search tool
//!
//! Provides web search via configurable providers (SerpApi, Brave, Serper)

use std::fmt::Write as _;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::{SearchConfig, SearchProviderKind};
use crate::tools::Tool;
use crate::{Error, Result};

/// Results requested per query
const DEFAULT_LIMIT: usize = 5;

/// Search provider configuration
#[derive(Debug, Clone)]
pub enum SearchProvider {
    /// SerpApi (Google results)
    SerpApi {
        /// API key for SerpApi
        api_key: SecretString,
    },
    /// Brave Search API
    Brave {
        /// API key for Brave Search
        api_key: SecretString,
    },
    /// Serper (Google) Search API
    Serper {
        /// API key for Serper
        api_key: SecretString,
    },
}

impl SearchProvider {
    const fn default_base_url(&self) -> &'static str {
        match self {
            Self::SerpApi { .. } => "https://serpapi.com",
            Self::Brave { .. } => "https://api.search.brave.com/res/v1",
            Self::Serper { .. } => "https://google.serper.dev",
        }
    }
}

/// Web search tool
pub struct WebSearchTool {
    provider: SearchProvider,
    base_url: String,
    client: reqwest::Client,
}

/// Search result from web search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title
    pub title: String,
    /// Result URL
    pub url: String,
    /// Result snippet/description
    pub snippet: String,
}

/// Arguments the model passes to `web_search`
#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

/// SerpApi response
#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiResult>,
}

#[derive(Debug, Deserialize)]
struct SerpApiResult {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Brave Search API response
#[derive(Debug, Deserialize)]
struct BraveSearchResponse {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

/// Serper API response
#[derive(Debug, Deserialize)]
struct SerperSearchResponse {
    organic: Option<Vec<SerperResult>>,
}

#[derive(Debug, Deserialize)]
struct SerperResult {
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Serper API request body
#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

/// Render results as numbered `title / url / snippet` blocks
#[must_use]
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let mut out = String::new();
    for (i, r) in results.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}. {}\n{}\n{}", i + 1, r.title, r.url, r.snippet);
    }
    out.trim_end().to_string()
}

fn search_error(provider: &str, e: reqwest::Error) -> Error {
    Error::Tool(format!("{provider} search failed: {}", e.without_url()))
}

impl WebSearchTool {
    /// Create a web search tool for `provider`, optionally against a custom endpoint
    #[must_use]
    pub fn new(provider: SearchProvider, base_url: Option<String>) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            provider,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Create from the loaded configuration
    #[must_use]
    pub fn from_config(config: &SearchConfig) -> Self {
        let api_key = config.api_key.clone();
        let provider = match config.provider {
            SearchProviderKind::SerpApi => SearchProvider::SerpApi { api_key },
            SearchProviderKind::Brave => SearchProvider::Brave { api_key },
            SearchProviderKind::Serper => SearchProvider::Serper { api_key },
        };
        Self::new(provider, config.base_url.clone())
    }

    /// Perform a web search
    ///
    /// # Errors
    ///
    /// Returns error if the search request fails or response parsing fails
    pub async fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchResult>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let mut results = match &self.provider {
            SearchProvider::SerpApi { api_key } => self.search_serpapi(api_key, query).await?,
            SearchProvider::Brave { api_key } => self.search_brave(api_key, query, limit).await?,
            SearchProvider::Serper { api_key } => self.search_serper(api_key, query, limit).await?,
        };
        results.truncate(limit);
        Ok(results)
    }

    /// Search using SerpApi
    async fn search_serpapi(&self, api_key: &SecretString, query: &str) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get(format!("{}/search.json", self.base_url))
            .query(&[("engine", "google"), ("q", query), ("api_key", api_key.expose_secret())])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| search_error("SerpApi", e))?;

        let body: SerpApiResponse = response.json().await.map_err(|e| search_error("SerpApi", e))?;

        Ok(body
            .organic_results
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                url: r.link,
                snippet: r.snippet,
            })
            .collect())
    }

    /// Search using Brave Search API
    async fn search_brave(&self, api_key: &SecretString, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get(format!("{}/web/search", self.base_url))
            .header("X-Subscription-Token", api_key.expose_secret())
            .query(&[("q", query), ("count", &limit.to_string())])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| search_error("Brave", e))?;

        let brave_response: BraveSearchResponse = response.json().await.map_err(|e| search_error("Brave", e))?;

        let results = brave_response
            .web
            .map(|web| {
                web.results
                    .into_iter()
                    .map(|r| SearchResult {
                        title: r.title,
                        url: r.url,
                        snippet: r.description,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }

    /// Search using Serper API
    async fn search_serper(&self, api_key: &SecretString, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("X-API-KEY", api_key.expose_secret())
            .json(&SerperRequest { q: query, num: limit })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| search_error("Serper", e))?;

        let serper_response: SerperSearchResponse = response.json().await.map_err(|e| search_error("Serper", e))?;

        let results = serper_response
            .organic
            .map(|organic| {
                organic
                    .into_iter()
                    .map(|r| SearchResult {
                        title: r.title,
                        url: r.link,
                        snippet: r.snippet,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "web_search"
    }

    fn description(&self) -> &'static str {
        "Search the web for current events and facts. Input is a search query."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &str) -> Result<String> {
        let args: SearchArgs = serde_json::from_str(arguments)
            .map_err(|e| Error::Tool(format!("invalid web_search arguments: {e}")))?;

        let results = self.search(&args.query, None).await?;
        tracing::debug!(query = %args.query, results = results.len(), "web search complete");
        Ok(format_results(&results))
    }
}
