use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use super::utils::strip_code_fences;
use crate::error::MnemeError;
use crate::llm::prompts::{
    scorer_user_prompt, SCORER_FALLBACK_SYSTEM_PROMPT, SCORER_SYSTEM_PROMPT,
};
use crate::llm::{ChatBackend, CompletionOptions};
use crate::models::ChatMessage;

/// The scorer's verdict on one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryScore {
    pub importance: f64,
    pub memory: Option<String>,
}

impl MemoryScore {
    /// The statement to remember, if it clears `threshold`.
    pub fn accepted(&self, threshold: f64) -> Option<&str> {
        if self.importance >= threshold {
            self.memory.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreDecodeError {
    #[error("scorer returned malformed JSON: {0}")]
    MalformedJson(String),

    #[error("scorer JSON has the wrong shape: {0}")]
    SchemaMismatch(String),

    #[error("importance {0} is outside [0, 1]")]
    ImportanceOutOfRange(f64),
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error(transparent)]
    Backend(MnemeError),

    #[error(transparent)]
    Decode(#[from] ScoreDecodeError),
}

/// Parses a scorer reply. Accepts an optional Markdown code fence; `memory`
/// may be a string, `null`, or absent. Blank memories count as `null`.
pub fn decode_score(raw: &str) -> Result<MemoryScore, ScoreDecodeError> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|e| ScoreDecodeError::MalformedJson(e.to_string()))?;

    let Value::Object(fields) = value else {
        return Err(ScoreDecodeError::SchemaMismatch(
            "expected a JSON object".to_string(),
        ));
    };

    let importance = match fields.get("importance") {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            ScoreDecodeError::SchemaMismatch("importance is not a finite number".to_string())
        })?,
        Some(other) => {
            return Err(ScoreDecodeError::SchemaMismatch(format!(
                "importance must be a number, got {other}"
            )))
        }
        None => {
            return Err(ScoreDecodeError::SchemaMismatch(
                "missing importance".to_string(),
            ))
        }
    };

    if !(0.0..=1.0).contains(&importance) {
        return Err(ScoreDecodeError::ImportanceOutOfRange(importance));
    }

    let memory = match fields.get("memory") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Some(other) => {
            return Err(ScoreDecodeError::SchemaMismatch(format!(
                "memory must be a string or null, got {other}"
            )))
        }
    };

    Ok(MemoryScore { importance, memory })
}

/// LLM classifier used when no fact pattern matched.
///
/// A backend failure of the primary model triggers exactly one attempt on
/// the fallback model with a shorter prompt. Decode failures never do.
pub struct ImportanceScorer {
    primary: Arc<dyn ChatBackend>,
    fallback: Option<Arc<dyn ChatBackend>>,
}

impl ImportanceScorer {
    pub fn new(primary: Arc<dyn ChatBackend>, fallback: Option<Arc<dyn ChatBackend>>) -> Self {
        Self { primary, fallback }
    }

    pub async fn score(&self, text: &str) -> Result<MemoryScore, ScoreError> {
        let options = CompletionOptions {
            temperature: Some(0.0),
            ..Default::default()
        };

        let primary_messages = [
            ChatMessage::system(SCORER_SYSTEM_PROMPT),
            ChatMessage::user(scorer_user_prompt(text)),
        ];

        let raw = match self.primary.complete(&primary_messages, Some(&options)).await {
            Ok(raw) => raw,
            Err(error) if error.is_backend_failure() => {
                let Some(fallback) = &self.fallback else {
                    return Err(ScoreError::Backend(error));
                };
                tracing::warn!(
                    model = self.primary.name(),
                    fallback = fallback.name(),
                    error = %error,
                    "Primary scoring failed, trying fallback"
                );
                let fallback_messages = [
                    ChatMessage::system(SCORER_FALLBACK_SYSTEM_PROMPT),
                    ChatMessage::user(text),
                ];
                fallback
                    .complete(&fallback_messages, Some(&options))
                    .await
                    .map_err(ScoreError::Backend)?
            }
            Err(error) => return Err(ScoreError::Backend(error)),
        };

        Ok(decode_score(&raw)?)
    }
}
