//! SeaORM entity models
//!
//! Database entities for Regula

mod document;
mod qa_cache_entry;

pub use document::{
    Entity as DocumentEntity,
    Model as DocumentRow,
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
};

pub use qa_cache_entry::{
    Entity as QaCacheEntity,
    Model as QaCacheRow,
    ActiveModel as QaCacheActiveModel,
    Column as QaCacheColumn,
};
