use std::sync::Arc;

use crate::embeddings::Embedder;
use crate::error::Result;
use crate::models::{RetrievalHit, VectorFilter};
use crate::vector::VectorIndex;

/// Semantic lookup over one vector namespace. Used for long-term memory
/// (owner-filtered) and for ingested document chunks.
pub struct SemanticRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    namespace: String,
    top_k: u32,
    min_score: f32,
    filter: VectorFilter,
}

impl SemanticRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        namespace: &str,
        top_k: u32,
        min_score: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            namespace: namespace.to_string(),
            top_k,
            min_score,
            filter: VectorFilter::new(),
        }
    }

    pub fn with_filter(mut self, filter: VectorFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Hits scoring strictly above the minimum, newest first. Hits without
    /// a timestamp sort last; equal timestamps keep index order.
    pub async fn query(&self, text: &str) -> Result<Vec<RetrievalHit>> {
        let vector = self.embedder.embed_query(text).await?;
        let matches = self
            .index
            .query(&self.namespace, &vector, self.top_k, &self.filter)
            .await?;

        let mut hits: Vec<RetrievalHit> = matches
            .iter()
            .filter(|m| m.score > self.min_score)
            .filter_map(|m| {
                Some(RetrievalHit {
                    text: m.text()?.to_string(),
                    score: m.score,
                    created_at: m.created_at(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(hits)
    }

    /// Rendered context block, or `""` when nothing qualifies or retrieval fails.
    pub async fn context(&self, text: &str) -> String {
        match self.query(text).await {
            Ok(hits) => render_hits(&hits),
            Err(error) => {
                tracing::warn!(namespace = %self.namespace, error = %error, "Retrieval failed, continuing without context");
                String::new()
            }
        }
    }
}

pub fn render_hits(hits: &[RetrievalHit]) -> String {
    hits.iter()
        .map(|hit| {
            let when = hit
                .created_at
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "Unknown Date".to_string());
            format!("[{when}] {}", hit.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
