//! CiteForge Crawler
//!
//! Traversal and ingestion engine for citation networks:
//! - Reference extraction from document text
//! - Record fetching with timeout, retry and rate limiting
//! - Visit ledger enforcing at-most-once processing
//! - Bounded-concurrency frontier scheduler
//! - Graph assembly and idempotent persistence

pub mod errors;
pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod graph;
pub mod ledger;
pub mod pdf;
pub mod persistence;
pub mod report;
pub mod scheduler;

pub use errors::{CrawlError, FailureReason};
pub use extractor::extract_references;
pub use fetcher::{create_rate_limiter, RecordFetcher, RetryPolicy};
pub use graph::{CitationGraph, GraphAssembler, GraphNode};
pub use ledger::{VisitLedger, VisitState};
pub use pdf::ArxivPdfSource;
pub use persistence::PersistenceGateway;
pub use report::{CrawlReport, RunStatus, StopReason};
pub use scheduler::{CrawlOptions, FrontierScheduler, RunState};
