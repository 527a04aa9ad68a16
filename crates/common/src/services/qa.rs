//! Question answering over a stored document
//!
//! Cache first, model second. Every answer produced by the model is written
//! back to the answer cache before it is returned, so a repeat of the same
//! question is served without another inference call.

use super::inflight::InFlight;
use crate::cache::AnswerCache;
use crate::documents::{canonical_id, DocumentStore};
use crate::errors::{AppError, Result};
use crate::inference::{InferenceGateway, QaRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// An answer and whether it came from the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub cached: bool,
}

/// Answers questions about documents
pub struct QaService {
    documents: Arc<dyn DocumentStore>,
    cache: Arc<dyn AnswerCache>,
    gateway: Arc<dyn InferenceGateway>,
    in_flight: Option<InFlight>,
}

impl QaService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        cache: Arc<dyn AnswerCache>,
        gateway: Arc<dyn InferenceGateway>,
    ) -> Self {
        Self {
            documents,
            cache,
            gateway,
            in_flight: None,
        }
    }

    /// Collapse concurrent identical misses into a single inference call
    pub fn with_in_flight_dedup(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(InFlight::new);
        self
    }

    /// Answer `question` about document `doc_id`
    #[instrument(skip(self, question), fields(question_len = question.len()))]
    pub async fn answer_question(&self, doc_id: &str, question: &str) -> Result<Answer> {
        if doc_id.is_empty() {
            return Err(AppError::MissingField {
                field: "docId".to_string(),
            });
        }
        if question.is_empty() {
            return Err(AppError::MissingField {
                field: "question".to_string(),
            });
        }

        // One cache key per document, whatever spelling of its id was used
        let doc_id = canonical_id(doc_id);
        let doc_id: &str = &doc_id;

        if let Some(answer) = self.lookup(doc_id, question).await? {
            return Ok(Answer { answer, cached: true });
        }

        match &self.in_flight {
            None => self.compute(doc_id, question).await,
            Some(in_flight) => {
                let _guard = in_flight.acquire(doc_id, question).await;
                // Another task may have filled the entry while we waited
                if let Some(answer) = self.lookup(doc_id, question).await? {
                    return Ok(Answer { answer, cached: true });
                }
                self.compute(doc_id, question).await
            }
        }
    }

    async fn lookup(&self, doc_id: &str, question: &str) -> Result<Option<String>> {
        let hit = self.cache.lookup(doc_id, question).await?;
        crate::metrics::record_cache(hit.is_some(), "qa");
        if hit.is_some() {
            debug!(doc_id, "Answer cache hit");
        }
        Ok(hit)
    }

    async fn compute(&self, doc_id: &str, question: &str) -> Result<Answer> {
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

        let model = self.cache.model();
        let start = Instant::now();
        let result = self
            .gateway
            .question_answering(QaRequest {
                model,
                question,
                context: &document.text,
            })
            .await
            .and_then(|response| response.into_answer());
        let elapsed = start.elapsed();
        crate::metrics::record_inference(elapsed.as_secs_f64(), "question_answering", model, result.is_ok());

        let answer = result.inspect_err(|e| {
            warn!(doc_id, gateway = self.gateway.name(), error = %e, "Question answering failed");
        })?;

        self.cache.record(doc_id, question, &answer).await?;

        info!(
            doc_id,
            model,
            latency_ms = elapsed.as_millis() as u64,
            "Answer computed and cached"
        );

        Ok(Answer {
            answer,
            cached: false,
        })
    }
}
