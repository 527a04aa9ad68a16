//! Upload ingestion
//!
//! Turns an upload into a stored [`Document`]. Only PDFs have text
//! extracted here; URLs are recorded with empty text and are rejected by the
//! QA and summarize flows until something fills them in.

mod pdf;

use crate::documents::{Document, DocumentMeta, DocumentStore};
use crate::errors::{AppError, Result};
use tracing::info;

/// One upload, already split by input type
#[derive(Debug, Clone)]
pub enum UploadInput {
    Pdf { file_name: String, bytes: Vec<u8> },
    Text { raw_text: String },
    Url { url: String },
}

impl UploadInput {
    /// Input type name as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            UploadInput::Pdf { .. } => "pdf",
            UploadInput::Text { .. } => "text",
            UploadInput::Url { .. } => "url",
        }
    }
}

/// Resolve an upload into document text and metadata
pub fn prepare(input: UploadInput) -> Result<(String, DocumentMeta)> {
    match input {
        UploadInput::Pdf { file_name, bytes } => {
            if bytes.is_empty() {
                return Err(AppError::MissingField {
                    field: "file".to_string(),
                });
            }
            let text = pdf::extract_text(&bytes)?;
            Ok((text, DocumentMeta::Pdf { file_name }))
        }
        UploadInput::Text { raw_text } => {
            if raw_text.trim().is_empty() {
                return Err(AppError::MissingField {
                    field: "rawText".to_string(),
                });
            }
            Ok((raw_text, DocumentMeta::Text))
        }
        UploadInput::Url { url } => {
            let url = url.trim();
            if url.is_empty() {
                return Err(AppError::MissingField {
                    field: "url".to_string(),
                });
            }
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| AppError::invalid("url", format!("Invalid URL: {}", e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::invalid("url", "URL must use http or https"));
            }
            Ok((String::new(), DocumentMeta::Url { url: parsed.to_string() }))
        }
    }
}

/// Validate, extract and store an upload
pub async fn ingest(store: &dyn DocumentStore, input: UploadInput) -> Result<Document> {
    let (text, meta) = prepare(input)?;
    let document = store.insert(text, meta).await?;

    crate::metrics::record_upload(document.meta.kind());
    info!(
        doc_id = %document.id,
        kind = document.meta.kind(),
        text_len = document.text.len(),
        "Document stored"
    );

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::MemoryDocumentStore;
    use crate::errors::ErrorKind;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_text_stored_verbatim() {
        let store = MemoryDocumentStore::new();
        let raw = "  Filings are due within 30 days.\n".to_string();
        let document = assert_ok!(ingest(&store, UploadInput::Text { raw_text: raw.clone() }).await);

        assert_eq!(document.text, raw);
        assert_eq!(document.meta, DocumentMeta::Text);

        let fetched = store.fetch(&document.id.to_string()).await.unwrap().unwrap();
        assert_eq!(fetched, document);
    }

    #[tokio::test]
    async fn test_pdf_text_is_extracted() {
        let store = MemoryDocumentStore::new();
        let input = UploadInput::Pdf {
            file_name: "rule.pdf".into(),
            bytes: pdf::tests::sample_pdf("Filings are due within 30 days."),
        };
        let document = assert_ok!(ingest(&store, input).await);

        assert_eq!(document.text, "Filings are due within 30 days.");
        assert_eq!(
            document.meta,
            DocumentMeta::Pdf {
                file_name: "rule.pdf".into()
            }
        );
    }

    #[tokio::test]
    async fn test_url_stored_without_text() {
        let store = MemoryDocumentStore::new();
        let input = UploadInput::Url {
            url: "https://example.gov/rules/2024-17".into(),
        };
        let document = ingest(&store, input).await.unwrap();

        assert!(!document.has_text());
        assert_eq!(document.meta.kind(), "url");
    }

    #[tokio::test]
    async fn test_rejected_inputs_store_nothing() {
        let store = MemoryDocumentStore::new();
        let rejected = vec![
            UploadInput::Text { raw_text: "   ".into() },
            UploadInput::Url { url: "ftp://example.gov/x".into() },
            UploadInput::Url { url: "not a url".into() },
            UploadInput::Pdf { file_name: "a.pdf".into(), bytes: Vec::new() },
            UploadInput::Pdf { file_name: "a.pdf".into(), bytes: b"%PDF-garbage".to_vec() },
        ];

        for input in rejected {
            let kind = input.kind();
            let err = assert_err!(ingest(&store, input).await);
            assert_eq!(err.kind(), ErrorKind::InvalidRequest, "{kind}");
        }
        assert!(store.list().await.unwrap().is_empty());
    }
}
