use async_trait::async_trait;

use crate::db::connection::Database;
use crate::db::repository::MemoryRepository;
use crate::db::traits::MemoryRecordStore;
use crate::error::Result;
use crate::models::MemoryRecord;

#[derive(Clone)]
pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl MemoryRecordStore for LibSqlBackend {
    async fn insert_memory(&self, memory: &MemoryRecord) -> Result<()> {
        let conn = self.db.connect()?;
        MemoryRepository::create(&conn, memory).await
    }

    async fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let conn = self.db.connect()?;
        MemoryRepository::get_by_id(&conn, id).await
    }

    async fn list_memories(
        &self,
        user_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<MemoryRecord>> {
        let conn = self.db.connect()?;
        MemoryRepository::list(&conn, user_id, limit).await
    }

    async fn delete_memory(&self, id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        MemoryRepository::delete(&conn, id).await
    }

    async fn count_memories(&self, user_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        MemoryRepository::count(&conn, user_id).await
    }
}
