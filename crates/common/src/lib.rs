//! Regula Common Library
//!
//! Core of the regulatory document assistant:
//! - Document storage (Postgres or in-memory)
//! - Answer cache keyed by document and question
//! - Inference gateway for question answering and chat completion
//! - Question answering and summarization services
//! - Upload ingestion
//! - Error types, configuration and metrics

pub mod cache;
pub mod config;
pub mod db;
pub mod documents;
pub mod errors;
pub mod inference;
pub mod ingest;
pub mod metrics;
pub mod services;
pub mod summary;

// Re-export commonly used types
pub use cache::AnswerCache;
pub use config::AppConfig;
pub use db::Repository;
pub use documents::{Document, DocumentMeta, DocumentStore};
pub use errors::{AppError, ErrorKind, Result};
pub use inference::InferenceGateway;
pub use services::Services;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default extractive question-answering model
pub const DEFAULT_QA_MODEL: &str = "deepset/roberta-base-squad2";

/// Default chat model used for summaries
pub const DEFAULT_CHAT_MODEL: &str = "deepseek-ai/DeepSeek-R1-0528";
