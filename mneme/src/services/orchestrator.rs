use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::context::{assemble_messages, merge_sections, ContextSection, SectionKind};
use super::memory::{MemoryService, MemoryWriter};
use super::retrieval::SemanticRetriever;
use super::session::SessionStore;
use super::web::WebRetriever;
use crate::error::{MnemeError, Result};
use crate::intelligence::{classify, Intent};
use crate::llm::ChatBackend;
use crate::models::{ChatMessage, Role, TurnRequest, UploadedFile};
use crate::processing::ContentExtractor;

/// Reply tokens for one turn. Backend failures arrive in-band as a final
/// `⚠️ Error: ...` chunk, so the stream itself is infallible.
pub type TurnStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Everything a turn needs, wired once at startup.
pub struct TurnComponents {
    pub memory: Arc<MemoryService>,
    pub writer: MemoryWriter,
    pub memory_retriever: Arc<SemanticRetriever>,
    pub document_retriever: Arc<SemanticRetriever>,
    pub web: Arc<WebRetriever>,
    pub sessions: SessionStore,
    pub extractor: ContentExtractor,
    pub primary: Arc<dyn ChatBackend>,
    pub fallback: Option<Arc<dyn ChatBackend>>,
}

pub struct TurnOrchestrator {
    components: TurnComponents,
}

enum Attempt {
    Completed,
    Cancelled,
    FailedBeforeOutput(MnemeError),
    FailedAfterOutput(MnemeError),
}

impl TurnOrchestrator {
    pub fn new(components: TurnComponents) -> Self {
        Self { components }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.components.sessions
    }

    pub fn writer(&self) -> &MemoryWriter {
        &self.components.writer
    }

    /// Validates the request, gathers context, and starts generation.
    ///
    /// Only validation errors are returned; every later failure degrades to
    /// less context or an inline error marker in the stream.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        cancel: CancellationToken,
    ) -> Result<TurnStream> {
        let TurnRequest {
            session_id,
            messages,
            file,
        } = request;

        let user_text = match messages.last() {
            None => {
                return Err(MnemeError::Validation(
                    "Invalid messages".to_string(),
                ))
            }
            Some(last) if last.role != Role::User => {
                return Err(MnemeError::Validation(
                    "Last message must be user".to_string(),
                ))
            }
            Some(last) => last.content.clone(),
        };

        let c = &self.components;
        c.sessions.append(&session_id, ChatMessage::user(user_text.clone()));

        let (fresh, long_term) = tokio::join!(
            c.memory.extract(&user_text),
            c.memory_retriever.context(&user_text)
        );
        let fresh_text = fresh.join("; ");
        c.writer.submit(fresh).await;

        let mut sections = vec![
            ContextSection::new(SectionKind::LongTermMemory, long_term),
            ContextSection::new(SectionKind::FreshMemory, fresh_text),
        ];

        if let Some(file) = &file {
            sections.push(self.file_section(file).await);
        }

        let intent = classify(&user_text);
        match intent {
            Intent::Document => sections.push(ContextSection::new(
                SectionKind::DocumentContext,
                c.document_retriever.context(&user_text).await,
            )),
            Intent::Web => sections.push(ContextSection::new(
                SectionKind::WebSearch,
                c.web.context(&user_text).await,
            )),
            Intent::None => {}
        }

        let context = merge_sections(sections);
        tracing::debug!(
            session_id = %session_id,
            intent = ?intent,
            context_chars = context.len(),
            "Turn context assembled"
        );
        let messages = assemble_messages(&messages, &context);

        Ok(self.generate(session_id, messages, cancel))
    }

    async fn file_section(&self, file: &UploadedFile) -> ContextSection {
        match self
            .components
            .extractor
            .extract(&file.bytes, file.mime_type.as_deref(), &file.name)
            .await
        {
            Ok(text) => ContextSection::new(SectionKind::UploadedFile(file.name.clone()), text),
            Err(error) => {
                tracing::warn!(file = %file.name, error = %error, "Uploaded file could not be read");
                ContextSection::file_read_error()
            }
        }
    }

    /// Streams from the primary backend, restarting once on the fallback if
    /// the primary fails or finishes before producing any token. A turn never
    /// ends empty: it carries tokens, an error marker, or was cancelled.
    fn generate(
        &self,
        session_id: String,
        messages: Vec<ChatMessage>,
        cancel: CancellationToken,
    ) -> TurnStream {
        let backends: Vec<Arc<dyn ChatBackend>> = std::iter::once(Arc::clone(&self.components.primary))
            .chain(self.components.fallback.clone())
            .collect();
        let sessions = self.components.sessions.clone();

        let stream = async_stream::stream! {
            let mut reply = String::new();
            let mut outcome = Attempt::Completed;

            for (attempt, backend) in backends.iter().enumerate() {
                if attempt > 0 {
                    if let Attempt::FailedBeforeOutput(error) = &outcome {
                        tracing::warn!(
                            fallback = backend.name(),
                            error = %error,
                            "Primary generation failed, trying fallback"
                        );
                    }
                }

                let opened = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    opened = backend.stream(&messages) => Some(opened),
                };

                let mut tokens = match opened {
                    None => {
                        outcome = Attempt::Cancelled;
                        break;
                    }
                    Some(Err(error)) => {
                        outcome = Attempt::FailedBeforeOutput(error);
                        continue;
                    }
                    Some(Ok(tokens)) => tokens,
                };

                let mut produced = false;
                outcome = loop {
                    let next = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        next = tokens.next() => Some(next),
                    };

                    match next {
                        None => break Attempt::Cancelled,
                        Some(None) if produced => break Attempt::Completed,
                        Some(None) => {
                            break Attempt::FailedBeforeOutput(MnemeError::Llm(
                                "model returned an empty response".to_string(),
                            ))
                        }
                        Some(Some(Ok(token))) => {
                            if token.is_empty() {
                                continue;
                            }
                            produced = true;
                            reply.push_str(&token);
                            yield token;
                        }
                        Some(Some(Err(error))) if produced => break Attempt::FailedAfterOutput(error),
                        Some(Some(Err(error))) => break Attempt::FailedBeforeOutput(error),
                    }
                };

                if !matches!(outcome, Attempt::FailedBeforeOutput(_)) {
                    break;
                }
            }

            match outcome {
                Attempt::Completed => {}
                Attempt::Cancelled => {
                    tracing::info!(session_id = %session_id, "Generation cancelled");
                }
                Attempt::FailedBeforeOutput(error) | Attempt::FailedAfterOutput(error) => {
                    tracing::error!(session_id = %session_id, error = %error, "Generation failed");
                    let marker = format!("⚠️ Error: {error}");
                    reply.push_str(&marker);
                    yield marker;
                }
            }

            if !reply.is_empty() {
                sessions.append(&session_id, ChatMessage::assistant(reply));
            }
        };

        Box::pin(stream)
    }
}
