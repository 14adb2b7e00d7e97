use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Metadata, VectorRecord};

/// A durable fact about the user. `id`, `embedding` and `created_at` never
/// change after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(text: String, embedding: Vec<f32>, user_id: String) -> Self {
        Self {
            id: nanoid::nanoid!(),
            text,
            embedding,
            user_id,
            created_at: Utc::now(),
        }
    }

    pub fn metadata(&self) -> Metadata {
        let value = json!({
            "text": self.text,
            "userId": self.user_id,
            "type": "memory",
            "createdAt": self.created_at.to_rfc3339(),
        });
        match value {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        }
    }

    pub fn to_vector_record(&self) -> VectorRecord {
        VectorRecord {
            id: self.id.clone(),
            values: self.embedding.clone(),
            metadata: self.metadata(),
        }
    }
}

/// Outcome of one write-path batch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitReport {
    pub stored: Vec<MemoryRecord>,
    pub duplicates: usize,
    /// Candidates skipped because the duplicate check itself failed.
    pub skipped: usize,
    /// False when the durable write succeeded but the vector upsert did not.
    pub index_synced: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub id: String,
    pub index_synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
