//! Application services
//!
//! Services receive their collaborators at construction time. [`Services`]
//! wires the configured backends together once at startup; tests build the
//! same graph from in-memory stores and a mock gateway.

mod inflight;
pub mod qa;
pub mod summarize;

pub use inflight::{InFlight, InFlightGuard};
pub use qa::{Answer, QaService};
pub use summarize::SummarizeService;

use crate::cache::{AnswerCache, DbAnswerCache, MemoryAnswerCache, RedisAnswerCache};
use crate::config::{AppConfig, CacheBackend, DocumentBackend};
use crate::db::{DbPool, Repository};
use crate::documents::{DocumentStore, MemoryDocumentStore};
use crate::errors::Result;
use crate::inference::{create_gateway, InferenceGateway};
use std::sync::Arc;
use tracing::info;

/// Everything the HTTP layer needs
#[derive(Clone)]
pub struct Services {
    pub documents: Arc<dyn DocumentStore>,
    pub answers: Arc<dyn AnswerCache>,
    pub qa: Arc<QaService>,
    pub summarize: Arc<SummarizeService>,
}

impl Services {
    /// Wire services from already constructed collaborators
    pub fn new(
        config: &AppConfig,
        documents: Arc<dyn DocumentStore>,
        answers: Arc<dyn AnswerCache>,
        gateway: Arc<dyn InferenceGateway>,
    ) -> Self {
        let qa = QaService::new(documents.clone(), answers.clone(), gateway.clone())
            .with_in_flight_dedup(config.storage.dedupe_in_flight);
        let summarize =
            SummarizeService::new(documents.clone(), gateway, config.inference.chat_model.clone())
                .with_max_tokens(config.inference.max_tokens);

        Self {
            documents,
            answers,
            qa: Arc::new(qa),
            summarize: Arc::new(summarize),
        }
    }

    /// Connect the backends named in configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let needs_postgres = config.storage.documents == DocumentBackend::Postgres
            || config.storage.answer_cache == CacheBackend::Postgres;

        let repo = if needs_postgres {
            let pool = DbPool::new(&config.database).await?;
            if config.database.run_migrations {
                pool.migrate().await?;
            }
            Some(Repository::new(pool))
        } else {
            None
        };

        let documents: Arc<dyn DocumentStore> = match (&config.storage.documents, &repo) {
            (DocumentBackend::Postgres, Some(repo)) => Arc::new(repo.clone()),
            _ => Arc::new(MemoryDocumentStore::new()),
        };

        let qa_model = config.inference.qa_model.clone();
        let answers: Arc<dyn AnswerCache> = match (&config.storage.answer_cache, &repo) {
            (CacheBackend::Postgres, Some(repo)) => Arc::new(DbAnswerCache::new(repo.clone(), qa_model)),
            (CacheBackend::Redis, _) => {
                let cache = RedisAnswerCache::new(
                    &config.redis.url,
                    config.storage.key_prefix.clone(),
                    qa_model,
                )
                .await?;
                cache.ping().await?;
                Arc::new(cache)
            }
            _ => Arc::new(MemoryAnswerCache::new(qa_model)),
        };

        let gateway = create_gateway(&config.inference)?;

        info!(
            documents = ?config.storage.documents,
            answer_cache = ?config.storage.answer_cache,
            gateway = gateway.name(),
            qa_model = %config.inference.qa_model,
            chat_model = %config.inference.chat_model,
            dedupe_in_flight = config.storage.dedupe_in_flight,
            "Services initialized"
        );

        Ok(Self::new(config, documents, answers, gateway))
    }
}
