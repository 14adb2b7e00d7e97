use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use super::VectorIndex;
use crate::error::{MnemeError, Result};
use crate::models::{Metadata, VectorFilter, VectorMatch, VectorRecord};

/// Pinecone data-plane client (`/vectors/upsert`, `/query`, `/vectors/delete`).
pub struct PineconeIndex {
    client: Client,
    host: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: u32,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Deserialize)]
struct PineconeMatch {
    id: String,
    score: f32,
    #[serde(default)]
    metadata: Option<Metadata>,
}

impl PineconeIndex {
    pub fn new(host: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "Api-Key",
            HeaderValue::from_str(api_key)
                .map_err(|e| MnemeError::Configuration(format!("Invalid Pinecone API key: {e}")))?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| MnemeError::VectorIndex(format!("Failed to create HTTP client: {e}")))?;

        let host = host.trim_end_matches('/');
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };

        Ok(Self { client, host })
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{path}", self.host))
            .json(body)
            .send()
            .await
            .map_err(|e| MnemeError::VectorIndex(format!("Pinecone request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MnemeError::VectorIndex(format!(
                "Pinecone {path} returned {status}: {body}"
            )));
        }
        Ok(response)
    }
}

fn filter_to_pinecone(filter: &VectorFilter) -> Option<Value> {
    if filter.is_empty() {
        return None;
    }
    let clauses: serde_json::Map<String, Value> = filter
        .equals
        .iter()
        .map(|(key, value)| (key.clone(), json!({ "$eq": value })))
        .collect();
    Some(Value::Object(clauses))
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, namespace: &str, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        // Pinecone recommends upserting in batches of 100.
        for batch in records.chunks(100) {
            self.post(
                "/vectors/upsert",
                &UpsertRequest {
                    vectors: batch,
                    namespace,
                },
            )
            .await?;
        }
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: u32,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>> {
        let request = QueryRequest {
            namespace,
            vector,
            top_k,
            include_metadata: true,
            filter: filter_to_pinecone(filter),
        };

        let response: QueryResponse = self
            .post("/query", &request)
            .await?
            .json()
            .await
            .map_err(|e| MnemeError::VectorIndex(format!("Invalid Pinecone response: {e}")))?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| VectorMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete(&self, namespace: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.post(
            "/vectors/delete",
            &json!({ "ids": ids, "namespace": namespace }),
        )
        .await?;
        Ok(())
    }

    async fn delete_matching(&self, namespace: &str, filter: &VectorFilter) -> Result<()> {
        let body = match filter_to_pinecone(filter) {
            Some(filter) => json!({ "filter": filter, "namespace": namespace }),
            None => json!({ "deleteAll": true, "namespace": namespace }),
        };
        self.post("/vectors/delete", &body).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "pinecone"
    }
}
