use async_trait::async_trait;

use crate::error::Result;
use crate::models::MemoryRecord;

/// Durable storage for memory records. The vector copy lives in a
/// [`crate::vector::VectorIndex`]; this store is the source of truth.
#[async_trait]
pub trait MemoryRecordStore: Send + Sync {
    async fn insert_memory(&self, memory: &MemoryRecord) -> Result<()>;
    async fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>>;
    /// Newest first.
    async fn list_memories(
        &self,
        user_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<MemoryRecord>>;
    /// Returns `false` when no record had this id.
    async fn delete_memory(&self, id: &str) -> Result<bool>;
    async fn count_memories(&self, user_id: &str) -> Result<u64>;
}
