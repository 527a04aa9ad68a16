//! Document store contract
//!
//! A document is written once at upload time and never mutated afterwards.
//! Services only depend on the [`DocumentStore`] trait so that the Postgres
//! repository and the in-memory store are interchangeable.

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Where a document's text came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DocumentMeta {
    Pdf {
        #[serde(rename = "fileName")]
        file_name: String,
    },
    Text,
    Url {
        url: String,
    },
}

impl DocumentMeta {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentMeta::Pdf { .. } => "pdf",
            DocumentMeta::Text => "text",
            DocumentMeta::Url { .. } => "url",
        }
    }
}

/// A stored regulatory document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub text: String,
    pub meta: DocumentMeta,
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Whether there is anything to reason over
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Canonical spelling of a document id.
///
/// Anything that parses as a UUID becomes lowercase hyphenated; other ids
/// are returned as given.
pub fn canonical_id(id: &str) -> Cow<'_, str> {
    match Uuid::parse_str(id) {
        Ok(uuid) => {
            let canonical = uuid.hyphenated().to_string();
            if canonical == id {
                Cow::Borrowed(id)
            } else {
                Cow::Owned(canonical)
            }
        }
        Err(_) => Cow::Borrowed(id),
    }
}

/// Storage for uploaded documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist a new document; the store assigns id and timestamp
    async fn insert(&self, text: String, meta: DocumentMeta) -> Result<Document>;

    /// Fetch a document by its identifier. Identifiers the store could never
    /// have issued resolve to `None`.
    async fn fetch(&self, id: &str) -> Result<Option<Document>>;

    /// All documents, newest first
    async fn list(&self) -> Result<Vec<Document>>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<()>;
}

/// Process-local document store
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<Vec<Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document with a caller-chosen id
    pub async fn insert_with_id(&self, id: Uuid, text: impl Into<String>, meta: DocumentMeta) -> Document {
        let document = Document {
            id,
            text: text.into(),
            meta,
            created_at: Utc::now(),
        };
        self.documents.write().await.push(document.clone());
        document
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, text: String, meta: DocumentMeta) -> Result<Document> {
        Ok(self.insert_with_id(Uuid::new_v4(), text, meta).await)
    }

    async fn fetch(&self, id: &str) -> Result<Option<Document>> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(None);
        };
        let documents = self.documents.read().await;
        Ok(documents.iter().find(|d| d.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(documents.iter().rev().cloned().collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
