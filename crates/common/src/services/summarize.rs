//! Structured summaries of stored documents
//!
//! Summaries are never cached; every call goes to the chat model.

use crate::documents::DocumentStore;
use crate::errors::{AppError, Result};
use crate::inference::{ChatMessage, ChatRequest, InferenceGateway};
use crate::summary::HEADINGS;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Build the summarization prompt for a document's text
pub fn prompt(text: &str) -> String {
    format!(
        "Summarize the following regulation for a small business owner. \
         Respond in markdown using exactly these four headings, in this order:\n\
         {}\n\n\
         Under the summary heading write a short plain-language paragraph. \
         Under the other headings write bullet points, or \"None\" when nothing applies.\n\n\
         Text: {}",
        HEADINGS.join("\n"),
        text
    )
}

/// Generates summaries with the chat model
pub struct SummarizeService {
    documents: Arc<dyn DocumentStore>,
    gateway: Arc<dyn InferenceGateway>,
    model: String,
    max_tokens: Option<u32>,
}

impl SummarizeService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        gateway: Arc<dyn InferenceGateway>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            gateway,
            model: model.into(),
            max_tokens: None,
        }
    }

    /// Cap the completion length
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Summarize document `doc_id`, returning the model's raw text
    #[instrument(skip(self))]
    pub async fn summarize(&self, doc_id: &str) -> Result<String> {
        if doc_id.is_empty() {
            return Err(AppError::MissingField {
                field: "docId".to_string(),
            });
        }

        let document = self
            .documents
            .fetch(doc_id)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound {
                id: doc_id.to_string(),
            })?;

        if !document.has_text() {
            return Err(AppError::NoContent {
                id: doc_id.to_string(),
            });
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt(&document.text))],
            max_tokens: self.max_tokens,
        };

        let start = Instant::now();
        let result = self
            .gateway
            .chat_completion(request)
            .await
            .and_then(|response| response.into_text());
        let elapsed = start.elapsed();
        crate::metrics::record_inference(elapsed.as_secs_f64(), "chat_completion", &self.model, result.is_ok());

        let summary = result.inspect_err(|e| {
            warn!(doc_id, gateway = self.gateway.name(), error = %e, "Summarization failed");
        })?;

        info!(
            doc_id,
            model = %self.model,
            latency_ms = elapsed.as_millis() as u64,
            summary_len = summary.len(),
            "Summary generated"
        );

        Ok(summary)
    }
}
