//! Document entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Extracted plain text; empty when extraction was deferred
    #[sea_orm(column_type = "Text")]
    pub text: String,

    /// Origin descriptor (`{"kind": "pdf" | "text" | "url", ...}`)
    #[sea_orm(column_type = "JsonBinary")]
    pub meta: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
