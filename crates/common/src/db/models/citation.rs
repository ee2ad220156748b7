//! Citation entity for graph relationships

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "citations")]
pub struct Model {
    /// Publication that contains the citation
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub citing_id: String,

    /// Publication that is being cited; may have no catalog record
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub cited_id: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
