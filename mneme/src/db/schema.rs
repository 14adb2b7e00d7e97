use libsql::Connection;

use crate::error::{MnemeError, Result};

use super::repository::MetadataRepository;

pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Durable memory records. The embedding is kept as a JSON array so the
        -- record survives a vector backend switch or re-index.
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            user_id TEXT NOT NULL,
            embedding TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memories_user_created
            ON memories(user_id, created_at);

        CREATE TABLE IF NOT EXISTS mneme_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .await?;

    Ok(())
}

/// Creates the namespaced vector table used by the libsql vector index.
///
/// The column width is fixed at creation, so the configured dimension is
/// recorded in `mneme_meta` and a later mismatch is refused instead of
/// failing on every insert.
pub async fn init_vector_schema(conn: &Connection, dimensions: usize) -> Result<()> {
    if let Some(existing) = MetadataRepository::get_embedding_dimensions(conn).await? {
        if existing != dimensions {
            return Err(MnemeError::Configuration(format!(
                "vector table was created for {existing}-dimensional embeddings, \
                 but EMBEDDING_DIMENSIONS is {dimensions}"
            )));
        }
    }

    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            namespace TEXT NOT NULL,
            id TEXT NOT NULL,
            embedding F32_BLOB({dimensions}) NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{{}}',
            PRIMARY KEY (namespace, id)
        );
        "#
    ))
    .await?;

    MetadataRepository::set_embedding_dimensions(conn, dimensions).await?;
    Ok(())
}
