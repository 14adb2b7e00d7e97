use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::{Metadata, VectorRecord};

/// A slice of an ingested document. The id is derived from the source and
/// position so re-ingesting a source overwrites its previous chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub source: String,
    pub position: usize,
    pub created_at: DateTime<Utc>,
}

impl DocumentChunk {
    pub fn new(text: String, source: &str, position: usize) -> Self {
        Self {
            id: chunk_id(source, position),
            text,
            source: source.to_string(),
            position,
            created_at: Utc::now(),
        }
    }

    pub fn metadata(&self) -> Metadata {
        let value = json!({
            "text": self.text,
            "source": self.source,
            "type": "document",
            "position": self.position,
            "createdAt": self.created_at.to_rfc3339(),
        });
        match value {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        }
    }

    pub fn to_vector_record(&self, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: self.id.clone(),
            values,
            metadata: self.metadata(),
        }
    }
}

pub fn chunk_id(source: &str, position: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b":");
    hasher.update(position.to_string().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
