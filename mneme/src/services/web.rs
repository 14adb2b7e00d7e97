use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::{MnemeError, Result};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebSource {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "content")]
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WebResults {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<WebSource>,
}

/// A web search provider.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<WebResults>;
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_answer: bool,
    include_raw_content: bool,
}

/// Tavily search API client. A missing API key surfaces as a
/// configuration error on each search, not at construction.
pub struct TavilyClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    search_depth: String,
    max_results: usize,
}

impl TavilyClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MnemeError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.tavily_api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search_depth: config.search_depth.clone(),
            max_results: config.max_results,
        })
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, query: &str) -> Result<WebResults> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| MnemeError::Configuration("TAVILY_API_KEY is not set".to_string()))?;

        let request = TavilyRequest {
            api_key,
            query,
            search_depth: &self.search_depth,
            max_results: self.max_results,
            include_answer: true,
            include_raw_content: false,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MnemeError::Search {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<WebResults>().await?)
    }
}

/// Turns web search results into a compact context block.
pub struct WebRetriever {
    search: Arc<dyn WebSearch>,
    max_results: usize,
}

impl WebRetriever {
    pub fn new(search: Arc<dyn WebSearch>, max_results: usize) -> Self {
        Self {
            search,
            max_results,
        }
    }

    pub async fn search(&self, query: &str) -> Result<String> {
        let results = self.search.search(query).await?;
        Ok(render_results(&results, self.max_results))
    }

    /// Rendered results, or `""` when the search fails.
    pub async fn context(&self, query: &str) -> String {
        match self.search(query).await {
            Ok(rendered) => rendered,
            Err(error @ MnemeError::Configuration(_)) => {
                tracing::error!(error = %error, "Web search is not configured");
                String::new()
            }
            Err(error) => {
                tracing::warn!(error = %error, "Web search failed, continuing without it");
                String::new()
            }
        }
    }
}

fn render_results(results: &WebResults, max_results: usize) -> String {
    let quick = results
        .answer
        .as_deref()
        .filter(|answer| !answer.trim().is_empty())
        .map(|answer| format!("Quick answer: {answer}\n\n"))
        .unwrap_or_default();

    let sources = results
        .results
        .iter()
        .take(max_results)
        .enumerate()
        .map(|(i, source)| {
            format!(
                "Source {}\nTitle: {}\nURL: {}\nSnippet: {}",
                i + 1,
                source.title,
                source.url,
                source.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let rendered = format!("{quick}{sources}");
    let rendered = rendered.trim();
    if rendered.is_empty() {
        "No web results found.".to_string()
    } else {
        rendered.to_string()
    }
}
