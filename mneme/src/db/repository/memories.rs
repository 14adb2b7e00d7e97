use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::Result;
use crate::models::MemoryRecord;

const COLUMNS: &str = "id, text, user_id, embedding, created_at";

pub struct MemoryRepository;

impl MemoryRepository {
    pub async fn create(conn: &Connection, memory: &MemoryRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO memories (id, text, user_id, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                memory.id.clone(),
                memory.text.clone(),
                memory.user_id.clone(),
                serde_json::to_string(&memory.embedding)?,
                memory.created_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<MemoryRecord>> {
        let mut rows = conn
            .query(
                &format!("SELECT {COLUMNS} FROM memories WHERE id = ?1"),
                params![id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_memory(&row)?))
        } else {
            Ok(None)
        }
    }

    /// Newest first. `rowid` breaks ties between records created in the same instant.
    pub async fn list(
        conn: &Connection,
        user_id: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<MemoryRecord>> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut rows = match user_id {
            Some(user_id) => {
                conn.query(
                    &format!(
                        "SELECT {COLUMNS} FROM memories WHERE user_id = ?1
                         ORDER BY created_at DESC, rowid DESC LIMIT ?2"
                    ),
                    params![user_id, limit],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!(
                        "SELECT {COLUMNS} FROM memories ORDER BY created_at DESC, rowid DESC LIMIT ?1"
                    ),
                    params![limit],
                )
                .await?
            }
        };

        let mut memories = Vec::new();
        while let Some(row) = rows.next().await? {
            memories.push(Self::row_to_memory(&row)?);
        }
        Ok(memories)
    }

    pub async fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let affected = conn
            .execute("DELETE FROM memories WHERE id = ?1", params![id])
            .await?;
        Ok(affected > 0)
    }

    pub async fn count(conn: &Connection, user_id: &str) -> Result<u64> {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM memories WHERE user_id = ?1",
                params![user_id],
            )
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    pub fn row_to_memory(row: &libsql::Row) -> Result<MemoryRecord> {
        Ok(MemoryRecord {
            id: row.get(0)?,
            text: row.get(1)?,
            user_id: row.get(2)?,
            embedding: serde_json::from_str(&row.get::<String>(3)?).unwrap_or_default(),
            created_at: DateTime::parse_from_rfc3339(&row.get::<String>(4)?)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn setup_test_db() -> Connection {
        let conn = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap();
        crate::db::schema::init_schema(&conn).await.unwrap();
        conn
    }

    fn record(text: &str, user_id: &str, minutes_ago: i64) -> MemoryRecord {
        let mut memory = MemoryRecord::new(text.to_string(), vec![0.5, 0.25], user_id.to_string());
        memory.created_at = Utc::now() - Duration::minutes(minutes_ago);
        memory
    }

    #[tokio::test]
    async fn test_create_and_get_round_trips_embedding() {
        let conn = setup_test_db().await;
        let memory = record("User's name is Priya", "default-user", 0);

        MemoryRepository::create(&conn, &memory).await.unwrap();
        let loaded = MemoryRepository::get_by_id(&conn, &memory.id)
            .await
            .unwrap()
            .expect("memory should exist");

        assert_eq!(loaded.text, "User's name is Priya");
        assert_eq!(loaded.embedding, vec![0.5, 0.25]);
        assert_eq!(loaded.created_at.timestamp(), memory.created_at.timestamp());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_scoped() {
        let conn = setup_test_db().await;
        MemoryRepository::create(&conn, &record("old", "u1", 30)).await.unwrap();
        MemoryRepository::create(&conn, &record("new", "u1", 1)).await.unwrap();
        MemoryRepository::create(&conn, &record("other", "u2", 0)).await.unwrap();

        let listed = MemoryRepository::list(&conn, Some("u1"), None).await.unwrap();
        let texts: Vec<_> = listed.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["new", "old"]);

        let limited = MemoryRepository::list(&conn, None, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].text, "other");
    }

    #[tokio::test]
    async fn test_delete_reports_missing_rows() {
        let conn = setup_test_db().await;
        let memory = record("User likes tea", "u1", 0);
        MemoryRepository::create(&conn, &memory).await.unwrap();

        assert!(MemoryRepository::delete(&conn, &memory.id).await.unwrap());
        assert!(!MemoryRepository::delete(&conn, &memory.id).await.unwrap());
        assert_eq!(MemoryRepository::count(&conn, "u1").await.unwrap(), 0);
    }
}
