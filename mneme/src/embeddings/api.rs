use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MnemeError, Result};

pub fn default_base_url(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "lmstudio" => "http://localhost:1234/v1",
        _ => "https://api.openai.com/v1",
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
#[derive(Clone)]
pub struct EmbeddingApiClient {
    client: Client,
    headers: HeaderMap,
    config: ApiConfig,
}

impl EmbeddingApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MnemeError::Embedding(format!("Failed to create HTTP client: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(ref api_key) = config.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))
                    .map_err(|e| MnemeError::Embedding(format!("Invalid API key header: {e}")))?,
            );
        }

        Ok(Self {
            client,
            headers,
            config,
        })
    }

    /// Retries rate limits, 5xx and transport errors with exponential backoff.
    /// Other 4xx responses fail immediately.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(100 * 2_u64.pow(attempt - 1));
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .headers(self.headers.clone())
                .json(&request)
                .send()
                .await;

            let resp = match response {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(MnemeError::Embedding(format!("Request failed: {e}")));
                    continue;
                }
            };

            let status = resp.status();
            if status.is_success() {
                let body: EmbeddingResponse = resp.json().await.map_err(|e| {
                    MnemeError::Embedding(format!("Failed to parse response: {e}"))
                })?;
                let mut data = body.data;
                // Some servers return items out of order; `index` is authoritative when present.
                data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
                return Ok(data.into_iter().map(|d| d.embedding).collect());
            }

            let body = resp.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                tracing::warn!(%status, attempt, "Embedding API request failed, will retry");
                last_error = Some(MnemeError::Embedding(format!("API error {status}: {body}")));
                continue;
            }

            return Err(MnemeError::Embedding(format!("API error {status}: {body}")));
        }

        Err(last_error.unwrap_or_else(|| MnemeError::Embedding("Unknown error".to_string())))
    }
}
