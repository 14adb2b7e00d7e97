use std::sync::Arc;

use super::utils::cosine_similarity;
use crate::error::Result;
use crate::models::VectorFilter;
use crate::vector::VectorIndex;

/// Write-time duplicate detection for memory statements.
///
/// Only new writes are checked; records that are already stored are never
/// compared with each other.
pub struct Deduplicator {
    index: Arc<dyn VectorIndex>,
    namespace: String,
    threshold: f32,
    top_k: u32,
}

impl Deduplicator {
    pub fn new(index: Arc<dyn VectorIndex>, namespace: &str, threshold: f32, top_k: u32) -> Self {
        Self {
            index,
            namespace: namespace.to_string(),
            threshold,
            top_k,
        }
    }

    /// True when a stored memory of `user_id` scores strictly above the threshold.
    pub async fn is_duplicate(&self, embedding: &[f32], user_id: &str) -> Result<bool> {
        let filter = VectorFilter::new()
            .eq("type", "memory")
            .eq("userId", user_id);
        let matches = self
            .index
            .query(&self.namespace, embedding, self.top_k, &filter)
            .await?;

        Ok(matches.iter().any(|m| m.score > self.threshold))
    }

    /// Same rule against candidates accepted earlier in the current batch,
    /// which are not in the index yet.
    pub fn duplicates_staged(&self, embedding: &[f32], staged: &[Vec<f32>]) -> bool {
        staged
            .iter()
            .any(|other| cosine_similarity(embedding, other) > self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VectorRecord;
    use crate::vector::InMemoryVectorIndex;
    use serde_json::json;

    fn memory_record(id: &str, values: Vec<f32>, owner: &str) -> VectorRecord {
        VectorRecord {
            id: id.into(),
            values,
            metadata: json!({"type": "memory", "userId": owner})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn test_threshold_is_strict_and_scoped_to_owner() {
        let index = Arc::new(InMemoryVectorIndex::new());
        index
            .upsert("memory", vec![memory_record("tea", vec![1.0, 0.0], "default-user")])
            .await
            .unwrap();
        let dedup = Deduplicator::new(index, "memory", 0.92, 5);

        assert!(dedup.is_duplicate(&[1.0, 0.01], "default-user").await.unwrap());
        assert!(!dedup.is_duplicate(&[1.0, 0.01], "someone-else").await.unwrap());
        // cos = 0.6 for (0.6, 0.8)
        assert!(!dedup.is_duplicate(&[0.6, 0.8], "default-user").await.unwrap());
    }

    #[test]
    fn test_staged_candidates() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let dedup = Deduplicator::new(index, "memory", 0.92, 5);

        let staged = vec![vec![1.0, 0.0]];
        assert!(dedup.duplicates_staged(&[2.0, 0.0], &staged));
        assert!(!dedup.duplicates_staged(&[0.0, 1.0], &staged));
        assert!(!dedup.duplicates_staged(&[1.0, 0.0], &[]));
    }
}
