use crate::error::{MnemeError, Result};

const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    Text,
}

/// Turns uploaded bytes into plain text. PDFs go through `pdf-extract`;
/// everything else is decoded as UTF-8, replacing invalid sequences.
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Magic bytes win over the declared MIME type, which wins over the
    /// file extension.
    pub fn detect_kind(bytes: &[u8], declared_mime: Option<&str>, file_name: &str) -> ContentKind {
        if let Some(kind) = infer::get(bytes) {
            return if kind.mime_type() == PDF_MIME {
                ContentKind::Pdf
            } else {
                ContentKind::Text
            };
        }

        if let Some(mime) = declared_mime {
            if mime.eq_ignore_ascii_case(PDF_MIME) {
                return ContentKind::Pdf;
            }
            if !mime.eq_ignore_ascii_case("application/octet-stream") {
                return ContentKind::Text;
            }
        }

        match mime_guess::from_path(file_name).first() {
            Some(guess) if guess.essence_str() == PDF_MIME => ContentKind::Pdf,
            _ => ContentKind::Text,
        }
    }

    pub async fn extract(
        &self,
        bytes: &[u8],
        declared_mime: Option<&str>,
        file_name: &str,
    ) -> Result<String> {
        match Self::detect_kind(bytes, declared_mime, file_name) {
            ContentKind::Pdf => {
                let owned = bytes.to_vec();
                let text = tokio::task::spawn_blocking(move || {
                    pdf_extract::extract_text_from_mem(&owned)
                })
                .await
                .map_err(|e| MnemeError::Processing(format!("PDF extraction aborted: {e}")))?
                .map_err(|e| MnemeError::Processing(format!("PDF extraction failed: {e}")))?;
                tracing::debug!(file = file_name, chars = text.len(), "Extracted PDF text");
                Ok(text)
            }
            ContentKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}
