use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use crate::config::{parse_llm_provider_model, LlmConfig};
use crate::error::{MnemeError, Result};
use crate::llm::api::LlmApiClient;
use crate::models::ChatMessage;

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A chat-capable language model.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: Option<&CompletionOptions>,
    ) -> Result<String>;

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAI,
    OpenRouter,
    Ollama,
    LmStudio,
    OpenAICompatible { base_url: String },
    Unavailable { reason: String },
}

/// [`ChatBackend`] over an OpenAI-compatible API. Construction never fails:
/// a missing key or unknown provider yields an unavailable provider that
/// errors with [`MnemeError::LlmUnavailable`] on first use.
#[derive(Clone)]
pub struct LlmProvider {
    backend: LlmBackend,
    model: String,
    client: Option<Arc<LlmApiClient>>,
}

impl LlmProvider {
    pub fn new(config: Option<&LlmConfig>) -> Self {
        let Some(config) = config else {
            return Self::unavailable("No LLM configuration provided");
        };

        let (provider, _model) = parse_llm_provider_model(&config.model);

        let backend = match provider.to_lowercase().as_str() {
            "openai" => LlmBackend::OpenAI,
            "openrouter" => LlmBackend::OpenRouter,
            "ollama" => LlmBackend::Ollama,
            "lmstudio" => LlmBackend::LmStudio,
            _ => {
                if let Some(base_url) = &config.base_url {
                    LlmBackend::OpenAICompatible {
                        base_url: base_url.clone(),
                    }
                } else {
                    return Self::unavailable(&format!(
                        "Unknown provider in model: {}",
                        config.model
                    ));
                }
            }
        };

        match LlmApiClient::new(config) {
            Ok(client) => Self {
                backend,
                model: config.model.clone(),
                client: Some(Arc::new(client)),
            },
            Err(error) => {
                tracing::warn!(model = %config.model, error = %error, "LLM backend unavailable");
                Self {
                    backend: LlmBackend::Unavailable {
                        reason: error.to_string(),
                    },
                    model: config.model.clone(),
                    client: None,
                }
            }
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            backend: LlmBackend::Unavailable {
                reason: reason.to_string(),
            },
            model: String::new(),
            client: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    pub fn backend(&self) -> &LlmBackend {
        &self.backend
    }

    fn client(&self) -> Result<&LlmApiClient> {
        match (&self.client, &self.backend) {
            (Some(client), _) => Ok(client),
            (None, LlmBackend::Unavailable { reason }) => {
                Err(MnemeError::LlmUnavailable(reason.clone()))
            }
            (None, _) => Err(MnemeError::LlmUnavailable(
                "LLM client was not initialized".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ChatBackend for LlmProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: Option<&CompletionOptions>,
    ) -> Result<String> {
        self.client()?.complete(messages, options).await
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream> {
        self.client()?.stream(messages, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str, api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            model: model.to_string(),
            fallback_model: None,
            scorer_model: model.to_string(),
            scorer_fallback_model: None,
            api_key: api_key.map(str::to_string),
            base_url: None,
            timeout_secs: 5,
            max_retries: 0,
        }
    }

    #[test]
    fn test_known_provider_with_key_is_available() {
        let provider = LlmProvider::new(Some(&config("openrouter/openrouter/auto", Some("k"))));
        assert!(provider.is_available());
        assert_eq!(provider.backend(), &LlmBackend::OpenRouter);
        assert_eq!(provider.name(), "openrouter/openrouter/auto");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let provider = LlmProvider::new(Some(&config("ollama/llama3", None)));
        assert!(provider.is_available());
        assert_eq!(provider.backend(), &LlmBackend::Ollama);
    }

    #[tokio::test]
    async fn test_missing_key_fails_at_first_use() {
        let provider = LlmProvider::new(Some(&config("openai/gpt-4o-mini", None)));
        assert!(!provider.is_available());

        let err = provider
            .complete(&[ChatMessage::user("hi")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, MnemeError::LlmUnavailable(_)));
        assert!(err.is_backend_failure());
    }

    #[test]
    fn test_unknown_provider_without_base_url() {
        let provider = LlmProvider::new(Some(&config("mystery-model", Some("k"))));
        assert!(matches!(provider.backend(), LlmBackend::Unavailable { .. }));
    }
}
