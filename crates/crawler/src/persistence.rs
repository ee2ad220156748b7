//! Persistence gateway
//!
//! Sequences writes of completed nodes to the catalog and graph stores. A
//! node's record and source node are written before any edge leaving it.
//! Store failures never abort a run: the node is remembered and retried once
//! by [`PersistenceGateway::flush_pending`].

use crate::graph::GraphNode;
use citeforge_common::errors::AppError;
use citeforge_common::metrics::record_store_failure;
use citeforge_common::{CatalogStore, GraphStore, PublicationId};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, warn};

/// A node whose last flush was rejected
#[derive(Debug, Clone)]
struct PendingFlush {
    node: GraphNode,
    error: String,
}

pub struct PersistenceGateway {
    catalog: Arc<dyn CatalogStore>,
    graph: Arc<dyn GraphStore>,
    pending: Mutex<BTreeMap<PublicationId, PendingFlush>>,
}

impl PersistenceGateway {
    /// Open both stores; the caller owns the matching [`close`](Self::close)
    pub async fn open(
        catalog: Arc<dyn CatalogStore>,
        graph: Arc<dyn GraphStore>,
    ) -> Result<Self, AppError> {
        catalog.open().await?;
        if let Err(e) = graph.open().await {
            // Do not leak the catalog when the graph store is unreachable
            if let Err(close_err) = catalog.close().await {
                warn!(error = %close_err, "Failed to close catalog store");
            }
            return Err(e);
        }

        debug!("Persistence gateway opened");
        Ok(Self {
            catalog,
            graph,
            pending: Mutex::new(BTreeMap::new()),
        })
    }

    fn pending(&self) -> MutexGuard<'_, BTreeMap<PublicationId, PendingFlush>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write one completed node and its outgoing edges.
    ///
    /// Safe to repeat: both stores upsert. On failure the node is kept for
    /// [`flush_pending`](Self::flush_pending) and the error is returned.
    #[instrument(skip(self, node), fields(id = %node.id, edges = node.references.len()))]
    pub async fn flush(&self, node: &GraphNode) -> Result<(), AppError> {
        match self.write(node).await {
            Ok(()) => {
                self.pending().remove(&node.id);
                Ok(())
            }
            Err((store, error)) => {
                record_store_failure(store);
                warn!(store, error = %error, "Store rejected write, will retry at end of run");
                self.pending().insert(
                    node.id.clone(),
                    PendingFlush {
                        node: node.clone(),
                        error: error.to_string(),
                    },
                );
                Err(error)
            }
        }
    }

    async fn write(&self, node: &GraphNode) -> Result<(), (&'static str, AppError)> {
        self.catalog
            .upsert_record(&node.id, &node.record)
            .await
            .map_err(|e| ("catalog", e))?;

        self.graph
            .upsert_node(&node.id)
            .await
            .map_err(|e| ("graph", e))?;

        try_join_all(node.references.iter().map(|to| async move {
            self.graph.upsert_node(to).await?;
            self.graph.upsert_edge(&node.id, to).await
        }))
        .await
        .map_err(|e| ("graph", e))?;

        Ok(())
    }

    /// Retry every remembered node once; returns what is still failing
    #[instrument(skip(self))]
    pub async fn flush_pending(&self) -> BTreeMap<PublicationId, String> {
        let retry: Vec<GraphNode> = self.pending().values().map(|p| p.node.clone()).collect();
        if retry.is_empty() {
            return BTreeMap::new();
        }

        info!(count = retry.len(), "Retrying failed store writes");
        for node in &retry {
            // flush() re-records the failure on error
            let _ = self.flush(node).await;
        }

        self.pending_failures()
    }

    /// Nodes whose last flush failed, with the last error
    pub fn pending_failures(&self) -> BTreeMap<PublicationId, String> {
        self.pending()
            .iter()
            .map(|(id, p)| (id.clone(), p.error.clone()))
            .collect()
    }

    /// Close both stores, attempting each even if the other fails
    pub async fn close(&self) -> Result<(), AppError> {
        let catalog = self.catalog.close().await;
        let graph = self.graph.close().await;
        debug!("Persistence gateway closed");
        catalog.and(graph)
    }
}
