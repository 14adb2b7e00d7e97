use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

use super::api::{default_base_url, ApiConfig, EmbeddingApiClient};
use crate::config::{parse_provider_model, EmbeddingsConfig};
use crate::error::{MnemeError, Result};

/// Asymmetric models embed questions and stored passages differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    Query,
    Passage,
}

/// Text to fixed-dimension vectors. Implementations must return exactly one
/// vector per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: Vec<String>, mode: EmbeddingMode) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(vec![query.to_string()], EmbeddingMode::Query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MnemeError::Embedding("No embedding generated".to_string()))
    }
}

enum EmbeddingBackend {
    Local {
        model: Arc<Mutex<TextEmbedding>>,
        batch_size: usize,
    },
    Api {
        client: EmbeddingApiClient,
        batch_size: usize,
    },
}

pub struct EmbeddingProvider {
    backend: EmbeddingBackend,
    model_name: String,
    dimensions: usize,
}

impl EmbeddingProvider {
    /// `EMBEDDING_MODEL` without a provider prefix loads a local fastembed
    /// model; `openai/...`, `openrouter/...` etc. use the HTTP API.
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let (provider, model_name) = parse_provider_model(&config.model);

        if provider == "local" {
            return Self::new_local(config, model_name);
        }

        let api_config = ApiConfig {
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url(provider).to_string()),
            api_key: config.api_key.clone(),
            model: model_name.to_string(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        };

        tracing::info!(provider, model = model_name, "Using API embeddings");

        Ok(Self {
            backend: EmbeddingBackend::Api {
                client: EmbeddingApiClient::new(api_config)?,
                batch_size: config.batch_size.max(1),
            },
            model_name: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    fn new_local(config: &EmbeddingsConfig, model_name: &str) -> Result<Self> {
        let embedding_model = resolve_embedding_model(model_name);
        let model = TextEmbedding::try_new(
            InitOptions::new(embedding_model).with_show_download_progress(true),
        )
        .map_err(|e| MnemeError::Embedding(e.to_string()))?;

        tracing::info!(model = model_name, "Loaded local embedding model");

        Ok(Self {
            backend: EmbeddingBackend::Local {
                model: Arc::new(Mutex::new(model)),
                batch_size: config.batch_size.max(1),
            },
            model_name: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl Embedder for EmbeddingProvider {
    async fn embed(&self, texts: Vec<String>, mode: EmbeddingMode) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let expected = texts.len();
        let embeddings = match &self.backend {
            EmbeddingBackend::Local { model, batch_size } => {
                let prefix = match mode {
                    EmbeddingMode::Query => "query: ",
                    EmbeddingMode::Passage => "passage: ",
                };
                let prefixed: Vec<String> = texts.iter().map(|t| format!("{prefix}{t}")).collect();
                let model = Arc::clone(model);
                let batch_size = *batch_size;
                tokio::task::spawn_blocking(move || {
                    let mut model = model.lock().map_err(|e| {
                        MnemeError::Embedding(format!("Embedding model lock poisoned: {e}"))
                    })?;
                    model
                        .embed(prefixed, Some(batch_size))
                        .map_err(|e| MnemeError::Embedding(e.to_string()))
                })
                .await
                .map_err(|e| MnemeError::Embedding(format!("Embedding worker failed: {e}")))??
            }
            EmbeddingBackend::Api { client, batch_size } => {
                let mut all = Vec::with_capacity(expected);
                for batch in texts.chunks(*batch_size) {
                    let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
                    all.extend(client.embed(&refs).await?);
                }
                all
            }
        };

        if embeddings.len() != expected {
            return Err(MnemeError::Embedding(format!(
                "Expected {expected} embeddings, got {}",
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

fn resolve_embedding_model(model_name: &str) -> EmbeddingModel {
    match model_name {
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "BAAI/bge-large-en-v1.5" | "bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
        "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            EmbeddingModel::AllMiniLML6V2
        }
        "intfloat/multilingual-e5-small" | "multilingual-e5-small" => {
            EmbeddingModel::MultilingualE5Small
        }
        "intfloat/multilingual-e5-base" | "multilingual-e5-base" => {
            EmbeddingModel::MultilingualE5Base
        }
        other => {
            tracing::warn!(model = other, "Unknown local embedding model, using bge-small-en-v1.5");
            EmbeddingModel::BGESmallENV15
        }
    }
}
