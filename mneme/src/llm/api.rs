use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};
use futures::StreamExt;

use super::provider::{CompletionOptions, TokenStream};
use crate::{
    config::{parse_llm_provider_model, LlmConfig},
    error::{MnemeError, Result},
    models::{ChatMessage, Role},
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Clone)]
struct ApiConfig {
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_retries: u32,
}

/// OpenAI-compatible chat client for one model.
#[derive(Clone)]
pub struct LlmApiClient {
    client: Client<OpenAIConfig>,
    config: ApiConfig,
}

impl LlmApiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_config = ApiConfig::from_llm_config(config);

        let (provider, _) = parse_llm_provider_model(&config.model);
        let needs_api_key = !matches!(
            provider.to_lowercase().as_str(),
            "ollama" | "local" | "lmstudio"
        );

        if needs_api_key && api_config.api_key.is_none() {
            return Err(MnemeError::LlmUnavailable(format!(
                "API key required for {provider} (set LLM_API_KEY or OPENROUTER_API_KEY)"
            )));
        }

        let openai_config = OpenAIConfig::new()
            .with_api_base(api_config.base_url.clone())
            .with_api_key(api_config.api_key.clone().unwrap_or_default());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                MnemeError::Llm(format!("Failed to create LLM HTTP client: {error}"))
            })?;

        // async-openai retries server errors internally for up to 15 minutes by
        // default. Attempt counts are owned by callers (fallback model, explicit
        // retries), so the internal backoff gives up immediately.
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::ZERO),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            config: api_config,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: Option<&CompletionOptions>,
    ) -> Result<String> {
        let mut last_error: Option<MnemeError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request = self.build_request(messages, options)?;

            match self.client.chat().create(request).await {
                Ok(response) => return Self::extract_content(response),
                Err(error) => match classify_error(error) {
                    Failure::Retry(error) if attempt < self.config.max_retries => {
                        tracing::warn!(model = %self.config.model, attempt, error = %error, "Retrying LLM completion");
                        last_error = Some(error);
                    }
                    Failure::Retry(error) | Failure::Fatal(error) => return Err(error),
                },
            }
        }

        Err(last_error
            .unwrap_or_else(|| MnemeError::Llm("LLM completion failed after retries".to_string())))
    }

    /// Streams content deltas. Connection and HTTP errors surface as the
    /// first item of the stream, not from this call.
    pub async fn stream(
        &self,
        messages: &[ChatMessage],
        options: Option<&CompletionOptions>,
    ) -> Result<TokenStream> {
        let request = self.build_request(messages, options)?;

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(Self::map_openai_error)?;

        let tokens = stream.filter_map(|chunk| async move {
            match chunk {
                Ok(response) => response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|token| !token.is_empty())
                    .map(Ok),
                Err(error) => Some(Err(Self::map_openai_error(error))),
            }
        });

        Ok(Box::pin(tokens))
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        options: Option<&CompletionOptions>,
    ) -> Result<CreateChatCompletionRequest> {
        if messages.is_empty() {
            return Err(MnemeError::Validation(
                "LLM request needs at least one message".to_string(),
            ));
        }

        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(self.config.model.clone()).messages(messages);

        if let Some(options) = options {
            if let Some(temperature) = options.temperature {
                request.temperature(temperature);
            }
            if let Some(max_tokens) = options.max_tokens {
                request.max_tokens(max_tokens);
            }
        }

        request.build().map_err(|error| {
            MnemeError::Validation(format!("Invalid LLM completion request: {error}"))
        })
    }

    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| MnemeError::Llm("LLM response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if message.trim().is_empty() {
            return Err(MnemeError::Llm(
                "LLM response contained empty content".to_string(),
            ));
        }

        Ok(message)
    }

    fn map_openai_error(error: OpenAIError) -> MnemeError {
        match error {
            OpenAIError::Reqwest(e) => MnemeError::Llm(format!("LLM request failed: {e}")),
            OpenAIError::ApiError(e) => MnemeError::Llm(format!("LLM API error: {e}")),
            OpenAIError::JSONDeserialize(e) => {
                MnemeError::Llm(format!("Failed to parse LLM response: {e}"))
            }
            OpenAIError::StreamError(message) => {
                MnemeError::Llm(format!("LLM stream failed: {message}"))
            }
            other => MnemeError::Llm(other.to_string()),
        }
    }
}

enum Failure {
    Retry(MnemeError),
    Fatal(MnemeError),
}

/// Sorts a failed completion into retryable or final.
///
/// async-openai turns every non-2xx reply into `ApiError`; 5xx bodies come
/// back untyped (no `type`, no `code`). Transport failures are retried.
fn classify_error(error: OpenAIError) -> Failure {
    match error {
        OpenAIError::ApiError(api) if is_rate_limit(&api) => {
            Failure::Fatal(MnemeError::LlmRateLimit { retry_after: None })
        }
        OpenAIError::ApiError(api) if is_auth_failure(&api) => Failure::Fatal(MnemeError::Llm(
            format!("LLM authentication failed: {}", api.message),
        )),
        OpenAIError::ApiError(api) if api.r#type.is_none() && api.code.is_none() => {
            Failure::Retry(MnemeError::Llm(format!("LLM API error: {api}")))
        }
        OpenAIError::Reqwest(e) => Failure::Retry(MnemeError::Llm(format!("LLM request failed: {e}"))),
        other => Failure::Fatal(LlmApiClient::map_openai_error(other)),
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage> {
    let content = message.content.as_str();
    let built: ChatCompletionRequestMessage = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()
            .map_err(|error| MnemeError::Validation(format!("Invalid system message: {error}")))?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map_err(|error| MnemeError::Validation(format!("Invalid user message: {error}")))?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()
            .map_err(|error| {
                MnemeError::Validation(format!("Invalid assistant message: {error}"))
            })?
            .into(),
    };
    Ok(built)
}

fn lowered(field: &Option<String>) -> String {
    field.as_deref().unwrap_or_default().to_lowercase()
}

fn is_rate_limit(api: &ApiError) -> bool {
    let message = api.message.to_lowercase();
    let code = lowered(&api.code);
    message.contains("rate limit")
        || message.contains("too many requests")
        || lowered(&api.r#type).contains("rate_limit")
        || code.contains("rate_limit")
        || code == "insufficient_quota"
}

fn is_auth_failure(api: &ApiError) -> bool {
    let message = api.message.to_lowercase();
    message.contains("unauthorized")
        || message.contains("invalid api key")
        || lowered(&api.code).contains("invalid_api_key")
}

impl ApiConfig {
    fn from_llm_config(config: &LlmConfig) -> Self {
        let (provider, model) = parse_llm_provider_model(&config.model);

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(provider).to_string());

        let normalized_model = if provider.eq_ignore_ascii_case("local") {
            config.model.clone()
        } else {
            model.to_string()
        };

        Self {
            base_url,
            api_key: config.api_key.clone(),
            model: normalized_model,
            max_retries: config.max_retries,
        }
    }
}

fn default_base_url(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openrouter" => OPENROUTER_BASE_URL,
        "ollama" => OLLAMA_BASE_URL,
        "lmstudio" => "http://localhost:1234/v1",
        _ => OPENAI_BASE_URL,
    }
}
