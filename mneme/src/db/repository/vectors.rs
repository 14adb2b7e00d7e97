use libsql::{params, params::Params, Connection, Value};

use crate::error::Result;
use crate::models::{Metadata, VectorFilter, VectorMatch, VectorRecord};

pub struct VectorRepository;

impl VectorRepository {
    /// Inserts or replaces every record in one transaction.
    pub async fn upsert_batch(
        conn: &Connection,
        namespace: &str,
        records: &[VectorRecord],
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction().await?;
        for record in records {
            tx.execute(
                "INSERT INTO vectors (namespace, id, embedding, metadata)
                 VALUES (?1, ?2, vector32(?3), ?4)
                 ON CONFLICT(namespace, id) DO UPDATE SET
                    embedding = excluded.embedding,
                    metadata = excluded.metadata",
                params![
                    namespace,
                    record.id.clone(),
                    serde_json::to_string(&record.values)?,
                    serde_json::to_string(&record.metadata)?,
                ],
            )
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    /// Exact nearest-neighbour scan within a namespace, best first.
    /// Score is cosine similarity (`1 - cosine distance`).
    pub async fn search(
        conn: &Connection,
        namespace: &str,
        embedding: &[f32],
        top_k: u32,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>> {
        let mut values: Vec<Value> = vec![
            Value::Text(namespace.to_string()),
            Value::Text(serde_json::to_string(embedding)?),
            Value::Integer(i64::from(top_k)),
        ];

        let conditions = filter_conditions(filter, &mut values);

        let query = format!(
            r#"
            SELECT id, metadata,
                   1 - vector_distance_cos(embedding, vector32(?2)) AS score
            FROM vectors
            WHERE namespace = ?1{conditions}
            ORDER BY score DESC
            LIMIT ?3
            "#
        );

        let mut rows = conn.query(&query, Params::Positional(values)).await?;

        let mut matches = Vec::new();
        while let Some(row) = rows.next().await? {
            let metadata: Metadata =
                serde_json::from_str(&row.get::<String>(1)?).unwrap_or_default();
            matches.push(VectorMatch {
                id: row.get(0)?,
                score: row.get::<f64>(2)? as f32,
                metadata,
            });
        }

        Ok(matches)
    }

    pub async fn delete(conn: &Connection, namespace: &str, ids: &[String]) -> Result<u64> {
        let mut deleted = 0;
        for id in ids {
            deleted += conn
                .execute(
                    "DELETE FROM vectors WHERE namespace = ?1 AND id = ?2",
                    params![namespace, id.clone()],
                )
                .await?;
        }
        Ok(deleted)
    }

    pub async fn delete_matching(
        conn: &Connection,
        namespace: &str,
        filter: &VectorFilter,
    ) -> Result<u64> {
        let mut values: Vec<Value> = vec![Value::Text(namespace.to_string())];
        let conditions = filter_conditions(filter, &mut values);
        let deleted = conn
            .execute(
                &format!("DELETE FROM vectors WHERE namespace = ?1{conditions}"),
                Params::Positional(values),
            )
            .await?;
        Ok(deleted)
    }
}

/// `AND json_extract(...) = ?` clauses for `filter`, appending their
/// parameters after the ones already in `values`.
fn filter_conditions(filter: &VectorFilter, values: &mut Vec<Value>) -> String {
    let mut conditions = String::new();
    for (key, expected) in &filter.equals {
        let path_idx = values.len() + 1;
        let value_idx = path_idx + 1;
        conditions.push_str(&format!(
            " AND json_extract(metadata, ?{path_idx}) = ?{value_idx}"
        ));
        values.push(Value::Text(format!("$.{key}")));
        values.push(Value::Text(expected.clone()));
    }
    conditions
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup_test_db() -> Connection {
        let conn = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap();
        crate::db::schema::init_schema(&conn).await.unwrap();
        crate::db::schema::init_vector_schema(&conn, 3).await.unwrap();
        conn
    }

    fn record(id: &str, values: Vec<f32>, metadata: serde_json::Value) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: metadata.as_object().cloned().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity_and_filters() {
        let conn = setup_test_db().await;
        VectorRepository::upsert_batch(
            &conn,
            "memory",
            &[
                record("a", vec![1.0, 0.0, 0.0], json!({"userId": "u1", "text": "a"})),
                record("b", vec![0.7, 0.7, 0.0], json!({"userId": "u1", "text": "b"})),
                record("c", vec![1.0, 0.0, 0.0], json!({"userId": "u2", "text": "c"})),
            ],
        )
        .await
        .unwrap();
        VectorRepository::upsert_batch(
            &conn,
            "documents",
            &[record("d", vec![1.0, 0.0, 0.0], json!({"text": "d"}))],
        )
        .await
        .unwrap();

        let filter = VectorFilter::new().eq("userId", "u1");
        let matches = VectorRepository::search(&conn, "memory", &[1.0, 0.0, 0.0], 5, &filter)
            .await
            .unwrap();

        let ids: Vec<_> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!((matches[0].score - 1.0).abs() < 1e-5);
        assert!(matches[1].score < matches[0].score);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_delete_removes() {
        let conn = setup_test_db().await;
        VectorRepository::upsert_batch(
            &conn,
            "documents",
            &[record("x", vec![1.0, 0.0, 0.0], json!({"text": "first"}))],
        )
        .await
        .unwrap();
        VectorRepository::upsert_batch(
            &conn,
            "documents",
            &[record("x", vec![0.0, 1.0, 0.0], json!({"text": "second"}))],
        )
        .await
        .unwrap();

        let matches =
            VectorRepository::search(&conn, "documents", &[0.0, 1.0, 0.0], 5, &VectorFilter::new())
                .await
                .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text(), Some("second"));

        let deleted = VectorRepository::delete(&conn, "documents", &["x".to_string()])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
    }

    #[tokio::test]
    async fn test_delete_matching_is_scoped_to_filter_and_namespace() {
        let conn = setup_test_db().await;
        VectorRepository::upsert_batch(
            &conn,
            "documents",
            &[
                record("a0", vec![1.0, 0.0, 0.0], json!({"type": "document", "source": "a.txt"})),
                record("a1", vec![0.0, 1.0, 0.0], json!({"type": "document", "source": "a.txt"})),
                record("b0", vec![1.0, 0.0, 0.0], json!({"type": "document", "source": "b.txt"})),
            ],
        )
        .await
        .unwrap();
        VectorRepository::upsert_batch(
            &conn,
            "memory",
            &[record("m", vec![1.0, 0.0, 0.0], json!({"type": "document", "source": "a.txt"}))],
        )
        .await
        .unwrap();

        let filter = VectorFilter::new().eq("type", "document").eq("source", "a.txt");
        let deleted = VectorRepository::delete_matching(&conn, "documents", &filter)
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        let left =
            VectorRepository::search(&conn, "documents", &[1.0, 0.0, 0.0], 5, &VectorFilter::new())
                .await
                .unwrap();
        let ids: Vec<_> = left.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b0"]);

        let other =
            VectorRepository::search(&conn, "memory", &[1.0, 0.0, 0.0], 5, &VectorFilter::new())
                .await
                .unwrap();
        assert_eq!(other.len(), 1);
    }
}
