//! Answer cache
//!
//! Maps `(document id, question)` to a previously computed answer.
//!
//! Semantics shared by every backend:
//! - `record` is a pure append; no uniqueness is enforced, so two racing
//!   writers can leave two entries for the same key.
//! - `lookup` returns the earliest matching entry, which keeps the answer
//!   stable once duplicates exist.
//! - Questions are compared verbatim (case and whitespace sensitive).
//! - Each cache instance is bound to one QA model; entries written under a
//!   different model are invisible to it.

use crate::db::models::QaCacheRow;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// A persisted (document, question, answer) triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub doc_id: String,
    pub question: String,
    pub answer: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(doc_id: &str, question: &str, answer: &str, model: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            model: model.to_string(),
            created_at: Utc::now(),
        }
    }

    fn matches(&self, doc_id: &str, question: &str) -> bool {
        self.doc_id == doc_id && self.question == question
    }
}

impl From<QaCacheRow> for CacheEntry {
    fn from(row: QaCacheRow) -> Self {
        Self {
            doc_id: row.doc_id,
            question: row.question,
            answer: row.answer,
            model: row.model,
            created_at: row.created_at.with_timezone(&Utc),
        }
    }
}

/// Keyed store of previously computed answers
#[async_trait]
pub trait AnswerCache: Send + Sync {
    /// Answer of the earliest entry matching both fields exactly
    async fn lookup(&self, doc_id: &str, question: &str) -> Result<Option<String>>;

    /// Append a new entry stamped with the current time
    async fn record(&self, doc_id: &str, question: &str, answer: &str) -> Result<()>;

    /// Every entry for a document, oldest first
    async fn history(&self, doc_id: &str) -> Result<Vec<CacheEntry>>;

    /// QA model this cache is scoped to
    fn model(&self) -> &str;
}

// ============================================================================
// Postgres
// ============================================================================

/// Answer cache backed by the `qa_cache` table
pub struct DbAnswerCache {
    repo: Repository,
    model: String,
}

impl DbAnswerCache {
    pub fn new(repo: Repository, model: impl Into<String>) -> Self {
        Self {
            repo,
            model: model.into(),
        }
    }
}

#[async_trait]
impl AnswerCache for DbAnswerCache {
    async fn lookup(&self, doc_id: &str, question: &str) -> Result<Option<String>> {
        let row = self
            .repo
            .find_cached_answer(doc_id, question, &self.model)
            .await?;
        Ok(row.map(|r| r.answer))
    }

    async fn record(&self, doc_id: &str, question: &str, answer: &str) -> Result<()> {
        self.repo
            .insert_cache_entry(doc_id, question, answer, &self.model)
            .await?;
        Ok(())
    }

    async fn history(&self, doc_id: &str) -> Result<Vec<CacheEntry>> {
        let rows = self.repo.list_cache_entries(doc_id, &self.model).await?;
        Ok(rows.into_iter().map(CacheEntry::from).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Redis
// ============================================================================

/// Answer cache backed by append-only Redis lists
///
/// Each `(model, doc, question)` key holds a list of serialized entries in
/// write order; a second list per document keeps the history view.
pub struct RedisAnswerCache {
    connection: ConnectionManager,
    key_prefix: String,
    model: String,
}

impl RedisAnswerCache {
    /// Connect to Redis
    pub async fn new(url: &str, key_prefix: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_connection_manager()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        Ok(Self {
            connection,
            key_prefix: key_prefix.into(),
            model: model.into(),
        })
    }

    /// Build a prefixed key
    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// Ping Redis to check connectivity
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Redis ping failed: {}", e),
            })?;
        Ok(())
    }

    async fn read_list(&self, key: &str) -> Result<Vec<CacheEntry>> {
        let mut conn = self.connection.clone();
        let raw: Vec<String> = conn.lrange(key, 0, -1).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to read key '{}': {}", key, e),
        })?;
        decode_entries(raw)
    }
}

/// Decode serialized entries, preserving list order
fn decode_entries(raw: Vec<String>) -> Result<Vec<CacheEntry>> {
    raw.iter()
        .map(|json| {
            serde_json::from_str(json).map_err(|e| AppError::CacheError {
                message: format!("Failed to parse cached entry: {}", e),
            })
        })
        .collect()
}

/// Answer of the first entry in list order that matches the key exactly
fn first_answer(entries: Vec<CacheEntry>, doc_id: &str, question: &str) -> Option<String> {
    entries
        .into_iter()
        .find(|e| e.matches(doc_id, question))
        .map(|e| e.answer)
}

#[async_trait]
impl AnswerCache for RedisAnswerCache {
    async fn lookup(&self, doc_id: &str, question: &str) -> Result<Option<String>> {
        let key = self.key(&keys::answer(&self.model, doc_id, question));
        let hit = first_answer(self.read_list(&key).await?, doc_id, question);

        debug!(key = %key, hit = hit.is_some(), "Answer cache lookup");
        Ok(hit)
    }

    async fn record(&self, doc_id: &str, question: &str, answer: &str) -> Result<()> {
        let entry = CacheEntry::new(doc_id, question, answer, &self.model);
        let json = serde_json::to_string(&entry)?;
        let key = self.key(&keys::answer(&self.model, doc_id, question));
        let history_key = self.key(&keys::history(&self.model, doc_id));

        let mut conn = self.connection.clone();
        redis::pipe()
            .atomic()
            .rpush(&key, &json)
            .ignore()
            .rpush(&history_key, &json)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to append key '{}': {}", key, e),
            })?;

        debug!(key = %key, "Answer cache append");
        Ok(())
    }

    async fn history(&self, doc_id: &str) -> Result<Vec<CacheEntry>> {
        let key = self.key(&keys::history(&self.model, doc_id));
        self.read_list(&key).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local answer cache
pub struct MemoryAnswerCache {
    entries: RwLock<Vec<CacheEntry>>,
    model: String,
}

impl MemoryAnswerCache {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            model: model.into(),
        }
    }

    /// Snapshot of every stored entry, in write order
    pub async fn entries(&self) -> Vec<CacheEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AnswerCache for MemoryAnswerCache {
    async fn lookup(&self, doc_id: &str, question: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|e| e.model == self.model && e.matches(doc_id, question))
            .map(|e| e.answer.clone()))
    }

    async fn record(&self, doc_id: &str, question: &str, answer: &str) -> Result<()> {
        let entry = CacheEntry::new(doc_id, question, answer, &self.model);
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn history(&self, doc_id: &str) -> Result<Vec<CacheEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.model == self.model && e.doc_id == doc_id)
            .cloned()
            .collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Cache key builder helpers
pub mod keys {
    use sha2::{Digest, Sha256};

    /// Hex SHA-256 of the question bytes; no normalization is applied
    pub fn question_hash(question: &str) -> String {
        hex::encode(Sha256::digest(question.as_bytes()))
    }

    /// Build the answer list key for one question
    pub fn answer(model: &str, doc_id: &str, question: &str) -> String {
        format!("qa:{}:{}:{}", model, doc_id, question_hash(question))
    }

    /// Build the per-document history key
    pub fn history(model: &str, doc_id: &str) -> String {
        format!("qa-history:{}:{}", model, doc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builders() {
        let key = keys::answer("squad2", "doc1", "What is the deadline?");
        assert!(key.starts_with("qa:squad2:doc1:"));
        assert_eq!(key.len(), "qa:squad2:doc1:".len() + 64);
        assert!(keys::history("squad2", "doc1").starts_with("qa-history:"));
    }

    #[test]
    fn test_question_hash_is_exact() {
        assert_ne!(
            keys::question_hash("What is the deadline?"),
            keys::question_hash("what is the deadline?")
        );
        assert_ne!(
            keys::question_hash("What is the deadline?"),
            keys::question_hash("What is the deadline? ")
        );
    }

    #[test]
    fn test_decode_entries_keeps_order() {
        let first = CacheEntry::new("doc1", "q", "first", "m");
        let second = CacheEntry::new("doc1", "q", "second", "m");
        let raw = vec![
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap(),
        ];

        let decoded = decode_entries(raw).unwrap();
        assert_eq!(decoded[0].answer, "first");
        assert_eq!(decoded[1].answer, "second");
    }

    #[test]
    fn test_decode_entries_rejects_garbage() {
        let err = decode_entries(vec!["not json".to_string()]).unwrap_err();
        assert!(matches!(err, AppError::CacheError { .. }));
    }

    #[test]
    fn test_first_answer_skips_foreign_entries() {
        let entries = vec![
            CacheEntry::new("doc1", "What is the deadline? ", "padded", "m"),
            CacheEntry::new("doc2", "What is the deadline?", "other doc", "m"),
            CacheEntry::new("doc1", "What is the deadline?", "first", "m"),
            CacheEntry::new("doc1", "What is the deadline?", "second", "m"),
        ];

        assert_eq!(
            first_answer(entries.clone(), "doc1", "What is the deadline?").as_deref(),
            Some("first")
        );
        assert!(first_answer(entries, "doc3", "What is the deadline?").is_none());
        assert!(first_answer(Vec::new(), "doc1", "q").is_none());
    }

    #[tokio::test]
    async fn test_memory_lookup_miss_then_hit() {
        let cache = MemoryAnswerCache::new("squad2");
        assert_eq!(cache.lookup("doc1", "What is the deadline?").await.unwrap(), None);

        cache.record("doc1", "What is the deadline?", "30 days").await.unwrap();
        assert_eq!(
            cache.lookup("doc1", "What is the deadline?").await.unwrap().as_deref(),
            Some("30 days")
        );
    }

    #[tokio::test]
    async fn test_memory_lookup_is_exact() {
        let cache = MemoryAnswerCache::new("squad2");
        cache.record("doc1", "What is the deadline?", "30 days").await.unwrap();

        assert!(cache.lookup("doc1", "what is the deadline?").await.unwrap().is_none());
        assert!(cache.lookup("doc1", " What is the deadline?").await.unwrap().is_none());
        assert!(cache.lookup("doc2", "What is the deadline?").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_duplicates_resolve_to_first() {
        let cache = MemoryAnswerCache::new("squad2");
        cache.record("doc1", "q", "first").await.unwrap();
        cache.record("doc1", "q", "second").await.unwrap();

        assert_eq!(cache.entries().await.len(), 2);
        for _ in 0..3 {
            assert_eq!(cache.lookup("doc1", "q").await.unwrap().as_deref(), Some("first"));
        }
    }

    #[tokio::test]
    async fn test_memory_history_is_scoped() {
        let cache = MemoryAnswerCache::new("squad2");
        cache.record("doc1", "q1", "a1").await.unwrap();
        cache.record("doc2", "q2", "a2").await.unwrap();
        cache.record("doc1", "q3", "a3").await.unwrap();

        let history = cache.history("doc1").await.unwrap();
        let questions: Vec<_> = history.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q1", "q3"]);
        assert!(history.iter().all(|e| e.model == "squad2"));
    }

    mod postgres {
        use super::*;
        use crate::db::models::QaCacheRow;
        use crate::db::DbPool;
        use crate::documents::DocumentStore;
        use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, Statement, Value};
        use uuid::Uuid;

        fn row(id: u128, doc_id: &str, question: &str, answer: &str) -> QaCacheRow {
            QaCacheRow {
                id: Uuid::from_u128(id),
                doc_id: doc_id.into(),
                question: question.into(),
                answer: answer.into(),
                model: "squad2".into(),
                created_at: Utc::now().into(),
            }
        }

        fn cache(rows: Vec<Vec<QaCacheRow>>) -> (DbAnswerCache, DatabaseConnection) {
            let conn = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results(rows)
                .into_connection();
            let repo = Repository::new(DbPool::from_connection(conn.clone()));
            (DbAnswerCache::new(repo, "squad2"), conn)
        }

        fn statements(conn: DatabaseConnection) -> Vec<Statement> {
            conn.into_transaction_log()
                .iter()
                .flat_map(|t| t.statements().to_vec())
                .collect()
        }

        fn values(statement: &Statement) -> Vec<Value> {
            statement.values.clone().map(|v| v.0).unwrap_or_default()
        }

        #[tokio::test]
        async fn test_lookup_filters_exactly_and_takes_earliest() {
            let (cache, conn) = cache(vec![vec![row(1, "doc1", "What is the deadline?", "first")]]);

            let hit = cache.lookup("doc1", "What is the deadline?").await.unwrap();
            assert_eq!(hit.as_deref(), Some("first"));

            let statements = statements(conn);
            assert_eq!(statements.len(), 1);
            let sql = &statements[0].sql;
            assert!(sql.contains(r#""qa_cache"."doc_id" = $1"#), "{sql}");
            assert!(sql.contains(r#""qa_cache"."question" = $2"#), "{sql}");
            assert!(sql.contains(r#""qa_cache"."model" = $3"#), "{sql}");
            assert!(
                sql.contains(r#"ORDER BY "qa_cache"."created_at" ASC, "qa_cache"."id" ASC"#),
                "{sql}"
            );
            assert!(sql.contains("LIMIT"), "{sql}");

            let values = values(&statements[0]);
            assert_eq!(values[0], Value::from("doc1"));
            assert_eq!(values[1], Value::from("What is the deadline?"));
            assert_eq!(values[2], Value::from("squad2"));
        }

        #[tokio::test]
        async fn test_lookup_miss() {
            let (cache, _conn) = cache(vec![Vec::new()]);
            assert!(cache.lookup("doc1", "q").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_record_appends_under_cache_model() {
            let (cache, conn) = cache(vec![vec![row(1, "doc1", "q", "30 days")]]);
            cache.record("doc1", "q", "30 days").await.unwrap();

            let statements = statements(conn);
            assert_eq!(statements.len(), 1);
            assert!(statements[0].sql.starts_with(r#"INSERT INTO "qa_cache""#), "{}", statements[0].sql);
            assert!(!statements[0].sql.contains("ON CONFLICT"));

            let values = values(&statements[0]);
            for expected in ["doc1", "q", "30 days", "squad2"] {
                assert!(values.contains(&Value::from(expected)), "missing {expected}");
            }
        }

        #[tokio::test]
        async fn test_history_is_scoped_and_ordered() {
            let (cache, conn) = cache(vec![vec![
                row(1, "doc1", "q1", "a1"),
                row(2, "doc1", "q2", "a2"),
            ]]);

            let history = cache.history("doc1").await.unwrap();
            let answers: Vec<_> = history.iter().map(|e| e.answer.as_str()).collect();
            assert_eq!(answers, vec!["a1", "a2"]);

            let statements = statements(conn);
            let sql = &statements[0].sql;
            assert!(sql.contains(r#""qa_cache"."doc_id" = $1"#), "{sql}");
            assert!(sql.contains(r#""qa_cache"."model" = $2"#), "{sql}");
            assert!(!sql.contains(r#""qa_cache"."question" ="#), "{sql}");
            assert!(
                sql.contains(r#"ORDER BY "qa_cache"."created_at" ASC, "qa_cache"."id" ASC"#),
                "{sql}"
            );
            assert!(!sql.contains("LIMIT"), "{sql}");
        }

        #[tokio::test]
        async fn test_unparseable_document_id_skips_the_database() {
            let (_cache, conn) = cache(Vec::new());
            let repo = Repository::new(DbPool::from_connection(conn.clone()));

            assert!(repo.fetch("doc1").await.unwrap().is_none());
            assert!(statements(conn).is_empty());
        }
    }
}
