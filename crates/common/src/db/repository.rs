//! Repository pattern for database operations
//!
//! Implements the catalog and graph stores on Postgres. Every write is an
//! `INSERT ... ON CONFLICT` upsert, so replaying a run is harmless.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use crate::models::{PublicationId, PublicationRecord};
use crate::store::{CatalogStore, GraphStore};
use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use tracing::{debug, info};

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
        self.pool.connection()
    }
}

#[async_trait]
impl CatalogStore for Repository {
    async fn open(&self) -> Result<()> {
        self.pool.ping().await?;
        self.pool.ensure_schema().await?;
        info!("Catalog store ready");
        Ok(())
    }

    async fn upsert_record(&self, id: &PublicationId, record: &PublicationRecord) -> Result<()> {
        let now = chrono::Utc::now();

        let model = PublicationActiveModel {
            id: Set(id.to_string()),
            title: Set(record.title.clone()),
            authors: Set(serde_json::json!(record.authors)),
            publication_year: Set(record.year),
            link: Set(record.link.clone()),
            pdf_url: Set(record.pdf_link()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        PublicationEntity::insert(model)
            .on_conflict(
                OnConflict::column(PublicationColumn::Id)
                    .update_columns([
                        PublicationColumn::Title,
                        PublicationColumn::Authors,
                        PublicationColumn::PublicationYear,
                        PublicationColumn::Link,
                        PublicationColumn::PdfUrl,
                        PublicationColumn::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn())
            .await?;

        debug!(id = %id, "Upserted publication record");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await
    }
}

#[async_trait]
impl GraphStore for Repository {
    async fn upsert_node(&self, id: &PublicationId) -> Result<()> {
        let model = GraphNodeActiveModel {
            id: Set(id.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        GraphNodeEntity::insert(model)
            .on_conflict(OnConflict::column(GraphNodeColumn::Id).do_nothing().to_owned())
            .exec_without_returning(self.conn())
            .await?;

        Ok(())
    }

    async fn upsert_edge(&self, from: &PublicationId, to: &PublicationId) -> Result<()> {
        let model = CitationActiveModel {
            citing_id: Set(from.to_string()),
            cited_id: Set(to.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        CitationEntity::insert(model)
            .on_conflict(
                OnConflict::columns([CitationColumn::CitingId, CitationColumn::CitedId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.conn())
            .await?;

        Ok(())
    }
}
