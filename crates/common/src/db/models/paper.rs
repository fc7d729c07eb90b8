//! Paper entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "papers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Author-initials code, unique and never reassigned
    #[sea_orm(column_type = "Text", unique)]
    pub code: String,

    #[sea_orm(column_type = "Text")]
    pub author: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub url: String,

    /// Free text, never parsed into a date
    #[sea_orm(column_type = "Text")]
    pub published_date: String,

    pub citation_count: Option<i64>,

    /// User text, stored verbatim
    #[sea_orm(column_type = "Text")]
    pub note: String,

    /// JSON array of strings; NULL until keywords are generated
    #[sea_orm(column_type = "Text", nullable)]
    pub keywords: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
