//! Publication catalog entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "publications")]
pub struct Model {
    /// Normalized publication identifier
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Author names in byline order, as a JSON array
    #[sea_orm(column_type = "JsonBinary")]
    pub authors: Json,

    pub publication_year: Option<i32>,

    #[sea_orm(column_type = "Text")]
    pub link: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub pdf_url: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
