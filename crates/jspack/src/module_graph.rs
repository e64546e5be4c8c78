//! The module graph handed from the graph builder to the bundle emitter
//!
//! Nodes are stored in discovery order and a node's id is its position. The
//! graph is immutable once built.

use std::{fmt, path::PathBuf};

use indexmap::IndexMap;
use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
};
use serde::Serialize;

/// Identifier of a discovered module; also its index in the module table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModuleId(u32);

impl ModuleId {
    /// The entry module is always discovered first
    pub const ENTRY: Self = Self(0);

    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying u32 value of the ModuleId
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One discovered module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNode {
    pub id: ModuleId,
    /// Where the module was read from; diagnostics only, never emitted
    pub source_path: PathBuf,
    pub transformed_body: String,
    /// Raw specifier -> id of the node it resolved to, in first-occurrence order
    pub specifier_map: IndexMap<String, ModuleId>,
}

/// A specifier whose target id is not a node of the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub from: ModuleId,
    pub specifier: String,
    pub target: ModuleId,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    nodes: Vec<ModuleNode>,
}

impl ModuleGraph {
    /// Wrap nodes whose ids already equal their positions
    pub fn from_nodes(nodes: Vec<ModuleNode>) -> Self {
        debug_assert!(
            nodes.iter().enumerate().all(|(i, n)| n.id.index() == i),
            "module ids must equal their discovery position"
        );
        Self { nodes }
    }

    pub fn nodes(&self) -> &[ModuleNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn entry(&self) -> Option<&ModuleNode> {
        self.nodes.first()
    }

    pub fn get(&self, id: ModuleId) -> Option<&ModuleNode> {
        self.nodes.get(id.index())
    }

    /// Every mapping whose target is missing from the graph
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.specifier_map
                    .iter()
                    .filter(|(_, target)| self.get(**target).is_none())
                    .map(|(specifier, target)| DanglingReference {
                        from: node.id,
                        specifier: specifier.clone(),
                        target: *target,
                    })
            })
            .collect()
    }

    /// Groups of modules that require each other, including self-imports.
    ///
    /// Only a graph built with path deduplication can contain these; the
    /// uncached runtime recurses forever on any of them.
    pub fn find_cycles(&self) -> Vec<Vec<ModuleId>> {
        let mut graph = DiGraph::<ModuleId, ()>::with_capacity(self.nodes.len(), 0);
        let indices: Vec<NodeIndex> = self.nodes.iter().map(|n| graph.add_node(n.id)).collect();
        for node in &self.nodes {
            for target in node.specifier_map.values() {
                if let Some(&to) = indices.get(target.index()) {
                    graph.update_edge(indices[node.id.index()], to, ());
                }
            }
        }

        let mut cycles: Vec<Vec<ModuleId>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1 || graph.contains_edge(component[0], component[0])
            })
            .map(|component| {
                let mut ids: Vec<ModuleId> = component.into_iter().map(|idx| graph[idx]).collect();
                ids.sort_unstable();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }
}
