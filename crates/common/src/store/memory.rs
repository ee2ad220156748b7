//! In-memory stores, used when no database is configured and in tests

use super::{CatalogStore, GraphStore};
use crate::errors::Result;
use crate::models::{CitationEdge, PublicationId, PublicationRecord};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Catalog keyed by publication id; later upserts replace the record
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    records: Mutex<HashMap<PublicationId, PublicationRecord>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &PublicationId) -> Option<PublicationRecord> {
        lock(&self.records).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn upsert_record(&self, id: &PublicationId, record: &PublicationRecord) -> Result<()> {
        lock(&self.records).insert(id.clone(), record.clone());
        Ok(())
    }
}

/// Graph with set semantics for both nodes and edges
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    nodes: Mutex<HashSet<PublicationId>>,
    edges: Mutex<HashSet<CitationEdge>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_node(&self, id: &PublicationId) -> bool {
        lock(&self.nodes).contains(id)
    }

    pub fn has_edge(&self, from: &PublicationId, to: &PublicationId) -> bool {
        lock(&self.edges).contains(&CitationEdge::new(from.clone(), to.clone()))
    }

    pub fn node_count(&self) -> usize {
        lock(&self.nodes).len()
    }

    pub fn edge_count(&self) -> usize {
        lock(&self.edges).len()
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn upsert_node(&self, id: &PublicationId) -> Result<()> {
        lock(&self.nodes).insert(id.clone());
        Ok(())
    }

    async fn upsert_edge(&self, from: &PublicationId, to: &PublicationId) -> Result<()> {
        lock(&self.edges).insert(CitationEdge::new(from.clone(), to.clone()));
        Ok(())
    }
}
