//! CiteForge Common Library
//!
//! Shared code for the CiteForge crawler including:
//! - Publication identifiers and records
//! - Error types and handling
//! - Configuration management
//! - Collaborator traits (metadata, documents, stores, seeds)
//! - Database models and repository patterns
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod sources;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result, SourceError};
pub use models::{CitationEdge, PublicationId, PublicationRecord, VersionPolicy};
pub use sources::{DocumentSource, MetadataProvider, SeedSource};
pub use store::{CatalogStore, GraphStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Title used when a provider returns a record without one
pub const UNKNOWN_TITLE: &str = "Unknown Title";
