//! External collaborators consulted during a crawl
//!
//! The traversal engine only sees these traits:
//! - `MetadataProvider`: identifier -> descriptive record
//! - `DocumentSource`: identifier -> extracted full text
//! - `SeedSource`: produces the initial identifiers of a run

mod arxiv;

pub use arxiv::{parse_atom_entry, ArxivMetadataProvider};

use crate::errors::{Result, SourceError};
use crate::models::{PublicationId, PublicationRecord};
use async_trait::async_trait;

/// Resolves a publication identifier into its descriptive record
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn get_metadata(
        &self,
        id: &PublicationId,
    ) -> std::result::Result<PublicationRecord, SourceError>;

    /// Short name used in logs and metrics
    fn name(&self) -> &str;
}

/// Retrieves the extracted full text of a publication
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn get_text(&self, id: &PublicationId) -> std::result::Result<String, SourceError>;

    fn name(&self) -> &str;
}

/// Produces raw seed identifiers for a run
#[async_trait]
pub trait SeedSource: Send + Sync {
    async fn seeds(&self) -> Result<Vec<String>>;
}

/// Seeds from a fixed list (configuration or command line)
#[derive(Debug, Clone, Default)]
pub struct StaticSeeds(pub Vec<String>);

#[async_trait]
impl SeedSource for StaticSeeds {
    async fn seeds(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}
