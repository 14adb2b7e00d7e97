use serde::Serialize;

use crate::processing::IngestReport;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestDocumentResponse {
    pub source: String,
    pub chunks: usize,
}

impl From<IngestReport> for IngestDocumentResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            source: report.source,
            chunks: report.chunks,
        }
    }
}
