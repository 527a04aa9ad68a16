//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling.

use crate::db::models::*;
use crate::db::DbPool;
use crate::documents::{Document, DocumentMeta, DocumentStore};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Create a new document
    pub async fn create_document(&self, text: String, meta: &DocumentMeta) -> Result<DocumentRow> {
        let document = DocumentActiveModel {
            id: Set(Uuid::new_v4()),
            text: Set(text),
            meta: Set(serde_json::to_value(meta)?),
            created_at: Set(Utc::now().into()),
        };

        document.insert(self.conn()).await.map_err(Into::into)
    }

    /// Find document by ID
    pub async fn find_document_by_id(&self, id: Uuid) -> Result<Option<DocumentRow>> {
        DocumentEntity::find_by_id(id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// List documents, newest first
    pub async fn list_documents(&self) -> Result<Vec<DocumentRow>> {
        DocumentEntity::find()
            .order_by_desc(DocumentColumn::CreatedAt)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Answer Cache Operations
    // ========================================================================

    /// Earliest entry matching document, question and model exactly
    pub async fn find_cached_answer(
        &self,
        doc_id: &str,
        question: &str,
        model: &str,
    ) -> Result<Option<QaCacheRow>> {
        QaCacheEntity::find()
            .filter(QaCacheColumn::DocId.eq(doc_id))
            .filter(QaCacheColumn::Question.eq(question))
            .filter(QaCacheColumn::Model.eq(model))
            .order_by_asc(QaCacheColumn::CreatedAt)
            .order_by_asc(QaCacheColumn::Id)
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    /// Append a cache entry; duplicates are allowed
    pub async fn insert_cache_entry(
        &self,
        doc_id: &str,
        question: &str,
        answer: &str,
        model: &str,
    ) -> Result<QaCacheRow> {
        let entry = QaCacheActiveModel {
            id: Set(Uuid::new_v4()),
            doc_id: Set(doc_id.to_string()),
            question: Set(question.to_string()),
            answer: Set(answer.to_string()),
            model: Set(model.to_string()),
            created_at: Set(Utc::now().into()),
        };

        entry.insert(self.conn()).await.map_err(Into::into)
    }

    /// All entries for a document in write order
    pub async fn list_cache_entries(&self, doc_id: &str, model: &str) -> Result<Vec<QaCacheRow>> {
        QaCacheEntity::find()
            .filter(QaCacheColumn::DocId.eq(doc_id))
            .filter(QaCacheColumn::Model.eq(model))
            .order_by_asc(QaCacheColumn::CreatedAt)
            .order_by_asc(QaCacheColumn::Id)
            .all(self.conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

impl TryFrom<DocumentRow> for Document {
    type Error = AppError;

    fn try_from(row: DocumentRow) -> Result<Self> {
        Ok(Document {
            id: row.id,
            text: row.text,
            meta: serde_json::from_value(row.meta)?,
            created_at: row.created_at.with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl DocumentStore for Repository {
    async fn insert(&self, text: String, meta: DocumentMeta) -> Result<Document> {
        let row = self.create_document(text, &meta).await?;
        row.try_into()
    }

    async fn fetch(&self, id: &str) -> Result<Option<Document>> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(None);
        };
        self.find_document_by_id(id)
            .await?
            .map(Document::try_from)
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Document>> {
        self.list_documents()
            .await?
            .into_iter()
            .map(Document::try_from)
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        Repository::ping(self).await
    }
}
