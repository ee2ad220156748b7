//! In-memory citation graph built while crawling
//!
//! Edge targets are identifiers, not references to nodes, so an edge to a
//! publication that was never visited (or is visited later) needs no fix-up.

use citeforge_common::{CitationEdge, PublicationId, PublicationRecord};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// A processed publication and its outgoing citations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: PublicationId,
    pub record: PublicationRecord,

    /// Cited publications, first-seen order, no duplicates
    pub references: Vec<PublicationId>,

    /// Distance from the nearest seed at which this node was processed
    pub depth: u32,

    /// False for leaf visits at the depth budget, whose references were not explored
    pub expanded: bool,

    /// Set when metadata succeeded but the document text did not
    pub partial_failure: Option<String>,
}

impl GraphNode {
    pub fn edges(&self) -> impl Iterator<Item = CitationEdge> + '_ {
        self.references
            .iter()
            .map(move |to| CitationEdge::new(self.id.clone(), to.clone()))
    }
}

/// Snapshot of the graph: nodes in insertion order plus a reverse index
#[derive(Debug, Clone, Default)]
pub struct CitationGraph {
    nodes: HashMap<PublicationId, GraphNode>,
    order: Vec<PublicationId>,

    /// Reverse adjacency: target -> citing publications; targets may be absent from `nodes`
    incoming: HashMap<PublicationId, Vec<PublicationId>>,
}

impl CitationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node once; a second insert for the same id is ignored
    fn insert(&mut self, mut node: GraphNode) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }

        let mut seen = HashSet::new();
        node.references
            .retain(|to| *to != node.id && seen.insert(to.clone()));

        for to in &node.references {
            self.incoming
                .entry(to.clone())
                .or_default()
                .push(node.id.clone());
        }

        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        true
    }

    pub fn get(&self, id: &PublicationId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &PublicationId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in the order they were recorded
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.references.len()).sum()
    }

    /// Publications cited by `id`; empty for unknown ids
    pub fn get_references(&self, id: &PublicationId) -> &[PublicationId] {
        self.nodes
            .get(id)
            .map(|n| n.references.as_slice())
            .unwrap_or(&[])
    }

    /// Recorded publications citing `id`, known or not
    pub fn get_citations(&self, id: &PublicationId) -> &[PublicationId] {
        self.incoming.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn edges(&self) -> impl Iterator<Item = CitationEdge> + '_ {
        self.nodes().flat_map(|n| n.edges())
    }

    /// Target node of an edge, or None while the target is not (yet) a node
    pub fn resolve(&self, edge: &CitationEdge) -> Option<&GraphNode> {
        self.nodes.get(&edge.to)
    }

    /// Edges whose target is not a node of this graph
    pub fn dangling_edges(&self) -> Vec<CitationEdge> {
        self.edges().filter(|e| !self.contains(&e.to)).collect()
    }
}

/// Thread-safe append-only wrapper shared by workers
#[derive(Debug, Default)]
pub struct GraphAssembler {
    graph: RwLock<CitationGraph>,
}

impl GraphAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and its edges; returns false if `id` was already recorded
    pub fn record(&self, node: GraphNode) -> bool {
        self.graph
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node)
    }

    /// Run `f` against the current graph under a read lock
    pub fn read<R>(&self, f: impl FnOnce(&CitationGraph) -> R) -> R {
        f(&self.graph.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Owned copy of the graph
    pub fn snapshot(&self) -> CitationGraph {
        self.read(|g| g.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeforge_common::VersionPolicy;
    use std::sync::Arc;

    fn id(raw: &str) -> PublicationId {
        PublicationId::parse(raw, VersionPolicy::Collapse).unwrap()
    }

    fn node(raw: &str, refs: &[&str]) -> GraphNode {
        GraphNode {
            id: id(raw),
            record: PublicationRecord {
                title: format!("Paper {}", raw),
                authors: vec![],
                year: None,
                link: format!("http://arxiv.org/abs/{}", raw),
            },
            references: refs.iter().map(|r| id(r)).collect(),
            depth: 0,
            expanded: true,
            partial_failure: None,
        }
    }

    #[test]
    fn test_graph_construction() {
        let assembler = GraphAssembler::new();
        let (a, b, c) = (id("1000.00001"), id("1000.00002"), id("1000.00003"));

        // A cites B, B cites C
        assert!(assembler.record(node("1000.00001", &["1000.00002"])));
        assert!(assembler.record(node("1000.00002", &["1000.00003"])));

        let graph = assembler.snapshot();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.get_references(&a), &[b.clone()]);
        assert_eq!(graph.get_citations(&b), &[a.clone()]);
        assert_eq!(graph.get_citations(&c), &[b]);
    }

    #[test]
    fn test_record_once_per_id() {
        let assembler = GraphAssembler::new();
        assert!(assembler.record(node("1000.00001", &["1000.00002"])));
        assert!(!assembler.record(node("1000.00001", &["1000.00003"])));

        let a = id("1000.00001");
        assert_eq!(assembler.read(|g| g.get_references(&a).to_vec()), vec![id("1000.00002")]);
    }

    #[test]
    fn test_edges_are_a_set_without_self_loops() {
        let assembler = GraphAssembler::new();
        assembler.record(node("1000.00001", &["1000.00002", "1000.00001", "1000.00002"]));

        let graph = assembler.snapshot();
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_dangling_edge_resolves_later() {
        let assembler = GraphAssembler::new();
        assembler.record(node("1000.00001", &["1000.00002"]));

        let edge = CitationEdge::new(id("1000.00001"), id("1000.00002"));
        assert!(assembler.read(|g| g.resolve(&edge).is_none()));
        assert_eq!(assembler.read(|g| g.dangling_edges()), vec![edge.clone()]);

        assembler.record(node("1000.00002", &[]));
        let resolved = assembler.read(|g| g.resolve(&edge).map(|n| n.id.clone()));
        assert_eq!(resolved, Some(id("1000.00002")));
        assert!(assembler.read(|g| g.dangling_edges()).is_empty());
    }

    #[test]
    fn test_concurrent_appends_of_distinct_ids() {
        let assembler = Arc::new(GraphAssembler::new());
        let handles: Vec<_> = (0..16)
            .map(|n| {
                let assembler = Arc::clone(&assembler);
                std::thread::spawn(move || {
                    assembler.record(node(&format!("2000.{:05}", n), &["1706.03762"]))
                })
            })
            .collect();

        assert!(handles.into_iter().all(|h| h.join().unwrap()));
        let graph = assembler.snapshot();
        assert_eq!(graph.node_count(), 16);
        assert_eq!(graph.get_citations(&id("1706.03762")).len(), 16);
    }
}
