use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::{ContentExtractor, WordChunker};
use crate::embeddings::{Embedder, EmbeddingMode};
use crate::error::{MnemeError, Result};
use crate::models::{DocumentChunk, VectorFilter, VectorRecord};
use crate::vector::VectorIndex;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub source: String,
    pub chunks: usize,
}

/// Extract, chunk, embed and index one document into the document namespace.
pub struct DocumentIngestor {
    extractor: ContentExtractor,
    chunker: WordChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    namespace: String,
}

impl DocumentIngestor {
    pub fn new(
        chunker: WordChunker,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        namespace: &str,
    ) -> Self {
        Self {
            extractor: ContentExtractor::new(),
            chunker,
            embedder,
            index,
            namespace: namespace.to_string(),
        }
    }

    pub async fn ingest_path(&self, path: &Path, source: Option<&str>) -> Result<IngestReport> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = source
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        let mime = mime_guess::from_path(path).first().map(|m| m.essence_str().to_string());

        self.ingest_bytes(&bytes, mime.as_deref(), &file_name, &source)
            .await
    }

    /// Re-ingesting the same `source` replaces all of its previous chunks.
    pub async fn ingest_bytes(
        &self,
        bytes: &[u8],
        mime: Option<&str>,
        file_name: &str,
        source: &str,
    ) -> Result<IngestReport> {
        let text = self.extractor.extract(bytes, mime, file_name).await?;
        let pieces = self.chunker.chunk(&text);
        if pieces.is_empty() {
            return Err(MnemeError::Validation("No chunks".to_string()));
        }

        let chunks: Vec<DocumentChunk> = pieces
            .into_iter()
            .enumerate()
            .map(|(position, text)| DocumentChunk::new(text, source, position))
            .collect();

        let embeddings = self
            .embedder
            .embed(
                chunks.iter().map(|c| c.text.clone()).collect(),
                EmbeddingMode::Passage,
            )
            .await?;
        if embeddings.len() != chunks.len() {
            return Err(MnemeError::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| chunk.to_vector_record(values))
            .collect();
        let count = records.len();

        let previous = VectorFilter::new().eq("type", "document").eq("source", source);
        self.index.delete_matching(&self.namespace, &previous).await?;
        self.index.upsert(&self.namespace, records).await?;

        tracing::info!(source, chunks = count, namespace = %self.namespace, "Document ingested");
        Ok(IngestReport {
            source: source.to_string(),
            chunks: count,
        })
    }
}
