use async_trait::async_trait;

use super::VectorIndex;
use crate::db::repository::VectorRepository;
use crate::db::{schema, Database};
use crate::error::{MnemeError, Result};
use crate::models::{VectorFilter, VectorMatch, VectorRecord};

/// Vector index stored next to the memory records, using libsql's native
/// `F32_BLOB` column type and `vector_distance_cos`.
pub struct LibSqlVectorIndex {
    db: Database,
    dimensions: usize,
}

impl LibSqlVectorIndex {
    pub async fn new(db: Database, dimensions: usize) -> Result<Self> {
        let conn = db.connect()?;
        schema::init_vector_schema(&conn, dimensions).await?;
        Ok(Self { db, dimensions })
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(MnemeError::VectorIndex(format!(
                "expected {}-dimensional vector, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(())
    }
}

fn index_error(error: MnemeError) -> MnemeError {
    match error {
        MnemeError::Database(e) => MnemeError::VectorIndex(e.to_string()),
        other => other,
    }
}

#[async_trait]
impl VectorIndex for LibSqlVectorIndex {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()> {
        for record in &records {
            self.check_dimensions(&record.values)?;
        }
        let conn = self.db.connect()?;
        VectorRepository::upsert_batch(&conn, namespace, &records)
            .await
            .map_err(index_error)
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: u32,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>> {
        self.check_dimensions(vector)?;
        let conn = self.db.connect()?;
        VectorRepository::search(&conn, namespace, vector, top_k, filter)
            .await
            .map_err(index_error)
    }

    async fn delete(&self, namespace: &str, ids: &[String]) -> Result<()> {
        let conn = self.db.connect()?;
        VectorRepository::delete(&conn, namespace, ids)
            .await
            .map(|_| ())
            .map_err(index_error)
    }

    async fn delete_matching(&self, namespace: &str, filter: &VectorFilter) -> Result<()> {
        let conn = self.db.connect()?;
        VectorRepository::delete_matching(&conn, namespace, filter)
            .await
            .map(|_| ())
            .map_err(index_error)
    }

    fn backend_name(&self) -> &'static str {
        "libsql"
    }
}
