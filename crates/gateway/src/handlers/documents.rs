//! Document listing and answer history handlers

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use regula_common::documents::{canonical_id, Document, DocumentMeta};
use regula_common::errors::{AppError, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;

/// Document listing entry; the text itself is not returned
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: Uuid,
    pub meta: DocumentMeta,
    pub created_at: DateTime<Utc>,
    pub text_length: usize,
}

impl From<Document> for DocumentSummary {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            text_length: document.text.chars().count(),
            meta: document.meta,
            created_at: document.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub doc_id: String,
    pub entries: Vec<HistoryEntry>,
}

/// List uploaded documents, newest first
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<DocumentList>> {
    let documents = state.services.documents.list().await?;

    Ok(Json(DocumentList {
        documents: documents.into_iter().map(DocumentSummary::from).collect(),
    }))
}

/// Questions already answered for a document, oldest first
pub async fn document_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>> {
    let id = canonical_id(&id).into_owned();
    if state.services.documents.fetch(&id).await?.is_none() {
        return Err(AppError::DocumentNotFound { id });
    }

    let entries = state
        .services
        .answers
        .history(&id)
        .await?
        .into_iter()
        .map(|entry| HistoryEntry {
            question: entry.question,
            answer: entry.answer,
            created_at: entry.created_at,
        })
        .collect();

    Ok(Json(HistoryResponse { doc_id: id, entries }))
}
