//! Persistence interfaces for publication records and the citation graph
//!
//! Both stores must offer idempotent upserts: a crashed-and-restarted run
//! writes the same rows again without producing duplicates.

mod memory;

pub use memory::{MemoryCatalogStore, MemoryGraphStore};

use crate::errors::Result;
use crate::models::{PublicationId, PublicationRecord};
use async_trait::async_trait;

/// Stores one descriptive record per publication
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Acquire connections or verify reachability before a run
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_record(&self, id: &PublicationId, record: &PublicationRecord) -> Result<()>;

    /// Release resources after a run, whatever its outcome
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Stores citation nodes and directed edges
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_node(&self, id: &PublicationId) -> Result<()>;

    async fn upsert_edge(&self, from: &PublicationId, to: &PublicationId) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
