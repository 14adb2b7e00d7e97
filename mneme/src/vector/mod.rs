//! Namespaced nearest-neighbour indexes.
//!
//! Writes are best effort from the caller's point of view: the durable
//! record store is the source of truth and an index failure after a durable
//! write is reported, not raised.

mod libsql;
mod memory;
mod pinecone;

pub use self::libsql::LibSqlVectorIndex;
pub use self::memory::InMemoryVectorIndex;
pub use self::pinecone::PineconeIndex;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{VectorBackendKind, VectorConfig};
use crate::db::Database;
use crate::error::{MnemeError, Result};
use crate::models::{VectorFilter, VectorMatch, VectorRecord};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()>;

    /// Up to `top_k` matches, best first.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: u32,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>>;

    async fn delete(&self, namespace: &str, ids: &[String]) -> Result<()>;

    /// Removes every record whose metadata matches `filter`. An empty filter
    /// clears the namespace.
    async fn delete_matching(&self, namespace: &str, filter: &VectorFilter) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}

pub async fn build_vector_index(
    config: &VectorConfig,
    db: &Database,
    dimensions: usize,
) -> Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match config.backend {
        VectorBackendKind::LibSql => Arc::new(LibSqlVectorIndex::new(db.clone(), dimensions).await?),
        VectorBackendKind::Memory => Arc::new(InMemoryVectorIndex::new()),
        VectorBackendKind::Pinecone => {
            let (Some(api_key), Some(host)) = (
                config.pinecone_api_key.as_deref(),
                config.pinecone_index_host.as_deref(),
            ) else {
                return Err(MnemeError::Configuration(
                    "VECTOR_BACKEND=pinecone requires PINECONE_API_KEY and PINECONE_INDEX_HOST"
                        .to_string(),
                ));
            };
            Arc::new(PineconeIndex::new(host, api_key, config.timeout_secs)?)
        }
    };

    tracing::info!(backend = index.backend_name(), "Vector index ready");
    Ok(index)
}
