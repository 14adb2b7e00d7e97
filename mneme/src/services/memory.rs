use std::sync::Arc;

use tokio_util::task::TaskTracker;

use crate::config::{MemoryConfig, MemoryWriteMode};
use crate::db::MemoryRecordStore;
use crate::embeddings::{Embedder, EmbeddingMode};
use crate::error::{MnemeError, Result};
use crate::intelligence::{Deduplicator, FactExtractor, ImportanceScorer, ScoreError};
use crate::models::{CommitReport, DeleteReport, MemoryRecord, VectorRecord};
use crate::vector::VectorIndex;

/// Owns the memory write path: deciding what to remember, deduplicating it,
/// and keeping the durable store and the vector index in step.
pub struct MemoryService {
    store: Arc<dyn MemoryRecordStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    facts: FactExtractor,
    scorer: ImportanceScorer,
    dedup: Deduplicator,
    namespace: String,
    user_id: String,
    importance_threshold: f64,
}

impl MemoryService {
    pub fn new(
        store: Arc<dyn MemoryRecordStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        scorer: ImportanceScorer,
        namespace: &str,
        config: &MemoryConfig,
    ) -> Self {
        let dedup = Deduplicator::new(
            Arc::clone(&index),
            namespace,
            config.duplicate_threshold,
            config.duplicate_top_k,
        );

        Self {
            store,
            index,
            embedder,
            facts: FactExtractor::new(),
            scorer,
            dedup,
            namespace: namespace.to_string(),
            user_id: config.user_id.clone(),
            importance_threshold: config.importance_threshold,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Statements worth remembering from one user message.
    ///
    /// Explicit disclosures win; the LLM scorer only runs when no pattern
    /// matched. Scorer failures of any kind mean "nothing to remember".
    pub async fn extract(&self, text: &str) -> Vec<String> {
        let explicit = self.facts.extract(text);
        if !explicit.is_empty() {
            tracing::debug!(count = explicit.len(), "Pattern memory extracted");
            return explicit;
        }

        match self.scorer.score(text).await {
            Ok(score) => match score.accepted(self.importance_threshold) {
                Some(memory) => {
                    tracing::debug!(importance = score.importance, "Scored memory accepted");
                    vec![memory.to_string()]
                }
                None => Vec::new(),
            },
            Err(ScoreError::Decode(error)) => {
                tracing::debug!(error = %error, "Scorer reply rejected, nothing remembered");
                Vec::new()
            }
            Err(ScoreError::Backend(error)) => {
                tracing::warn!(error = %error, "Memory scoring skipped");
                Vec::new()
            }
        }
    }

    /// Embeds, deduplicates and persists `statements`.
    ///
    /// Durable writes happen first. A failed vector upsert is reported through
    /// [`CommitReport::index_synced`] rather than returned as an error.
    pub async fn commit(&self, statements: &[String]) -> Result<CommitReport> {
        let mut report = CommitReport {
            index_synced: true,
            ..Default::default()
        };
        if statements.is_empty() {
            return Ok(report);
        }

        let embeddings = self
            .embedder
            .embed(statements.to_vec(), EmbeddingMode::Passage)
            .await?;
        if embeddings.len() != statements.len() {
            return Err(MnemeError::Embedding(format!(
                "expected {} embeddings, got {}",
                statements.len(),
                embeddings.len()
            )));
        }

        let mut staged: Vec<Vec<f32>> = Vec::new();
        let mut stored: Vec<MemoryRecord> = Vec::new();

        for (text, embedding) in statements.iter().zip(embeddings) {
            match self.dedup.is_duplicate(&embedding, &self.user_id).await {
                Ok(true) => {
                    tracing::debug!(memory = %text, "Skipping duplicate memory");
                    report.duplicates += 1;
                    continue;
                }
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(memory = %text, error = %error, "Duplicate check failed, skipping memory");
                    report.skipped += 1;
                    continue;
                }
            }

            if self.dedup.duplicates_staged(&embedding, &staged) {
                tracing::debug!(memory = %text, "Skipping duplicate within batch");
                report.duplicates += 1;
                continue;
            }

            let record = MemoryRecord::new(text.clone(), embedding, self.user_id.clone());
            self.store.insert_memory(&record).await?;
            staged.push(record.embedding.clone());
            stored.push(record);
        }

        if !stored.is_empty() {
            let vectors: Vec<VectorRecord> = stored.iter().map(MemoryRecord::to_vector_record).collect();
            if let Err(error) = self.index.upsert(&self.namespace, vectors).await {
                tracing::warn!(
                    count = stored.len(),
                    error = %error,
                    "Memories stored but vector upsert failed"
                );
                report.index_synced = false;
            }
        }

        tracing::info!(
            stored = stored.len(),
            duplicates = report.duplicates,
            skipped = report.skipped,
            "Memory commit finished"
        );
        report.stored = stored;
        Ok(report)
    }

    pub async fn list(&self, limit: Option<u32>) -> Result<Vec<MemoryRecord>> {
        self.store.list_memories(Some(&self.user_id), limit).await
    }

    /// Removes the durable record, then the vector copy (best effort).
    pub async fn delete(&self, id: &str) -> Result<DeleteReport> {
        if !self.store.delete_memory(id).await? {
            return Err(MnemeError::NotFound(format!("Memory {id} not found")));
        }

        match self.index.delete(&self.namespace, &[id.to_string()]).await {
            Ok(()) => Ok(DeleteReport {
                id: id.to_string(),
                index_synced: true,
                warning: None,
            }),
            Err(error) => {
                tracing::warn!(memory_id = id, error = %error, "Memory deleted but vector delete failed");
                Ok(DeleteReport {
                    id: id.to_string(),
                    index_synced: false,
                    warning: Some(format!(
                        "Memory removed from the store but not from the vector index: {error}"
                    )),
                })
            }
        }
    }
}

/// Runs memory commits according to the configured [`MemoryWriteMode`].
///
/// Spawned commits are tracked so shutdown can wait for them.
#[derive(Clone)]
pub struct MemoryWriter {
    service: Arc<MemoryService>,
    mode: MemoryWriteMode,
    tracker: TaskTracker,
}

impl MemoryWriter {
    pub fn new(service: Arc<MemoryService>, mode: MemoryWriteMode) -> Self {
        Self {
            service,
            mode,
            tracker: TaskTracker::new(),
        }
    }

    pub fn mode(&self) -> MemoryWriteMode {
        self.mode
    }

    /// Hands `statements` to the write path. Never fails: commit errors are logged.
    pub async fn submit(&self, statements: Vec<String>) {
        if statements.is_empty() {
            return;
        }

        match self.mode {
            MemoryWriteMode::Inline => {
                if let Err(error) = self.service.commit(&statements).await {
                    tracing::error!(error = %error, "Memory commit failed");
                }
            }
            MemoryWriteMode::Background => {
                self.spawn_commit(statements);
            }
            MemoryWriteMode::Bounded(wait) => {
                let handle = self.spawn_commit(statements);
                if tokio::time::timeout(wait, handle).await.is_err() {
                    tracing::debug!(
                        wait_ms = wait.as_millis() as u64,
                        "Memory commit still running, continuing without it"
                    );
                }
            }
        }
    }

    fn spawn_commit(&self, statements: Vec<String>) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(&self.service);
        self.tracker.spawn(async move {
            if let Err(error) = service.commit(&statements).await {
                tracing::error!(error = %error, "Background memory commit failed");
            }
        })
    }

    /// Stops accepting tracked work and waits up to `grace` for pending commits.
    pub async fn drain(&self, grace: std::time::Duration) {
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                pending = self.tracker.len(),
                "Shutdown grace period elapsed with memory writes pending"
            );
        }
    }
}
