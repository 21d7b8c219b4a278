//! Document graph for one bundling run
//!
//! Holds every document reachable from the requested roots together with its
//! resolved outgoing edges. Edges are kept per document in source order, which
//! is what traversals use so that their results are stable and readable. A
//! petgraph mirror of the internal edges backs the cycle analysis.

use log::debug;
use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
    visit::EdgeFiltered,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::ParsedModule,
    types::{EdgeKind, FxIndexMap},
    url::DocumentUrl,
};

/// Where an edge specifier points after resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeTarget {
    /// A document that takes part in bundling
    Document(DocumentUrl),
    /// An excluded document that stays a separate, untouched file
    External(DocumentUrl),
}

impl EdgeTarget {
    pub const fn url(&self) -> &DocumentUrl {
        match self {
            Self::Document(url) | Self::External(url) => url,
        }
    }

    pub const fn is_external(&self) -> bool {
        matches!(self, Self::External(_))
    }
}

/// A resolved outgoing edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEdge {
    pub specifier: String,
    pub target: EdgeTarget,
    pub kind: EdgeKind,
}

/// One loaded document
#[derive(Debug, Clone)]
pub struct Document {
    pub url: DocumentUrl,
    pub module: ParsedModule,
    edges: Vec<ResolvedEdge>,
}

impl Document {
    /// Outgoing edges in source order
    pub fn edges(&self) -> &[ResolvedEdge] {
        &self.edges
    }

    /// Resolution of a specifier written in this document
    pub fn resolve(&self, specifier: &str) -> Option<&EdgeTarget> {
        self.edges
            .iter()
            .find(|edge| edge.specifier == specifier)
            .map(|edge| &edge.target)
    }

    /// Bundled documents this one imports statically, in source order
    pub fn eager_dependencies(&self) -> impl Iterator<Item = &DocumentUrl> {
        self.internal_dependencies(EdgeKind::Eager)
    }

    /// Bundled documents this one imports dynamically, in source order
    pub fn lazy_dependencies(&self) -> impl Iterator<Item = &DocumentUrl> {
        self.internal_dependencies(EdgeKind::Lazy)
    }

    fn internal_dependencies(&self, kind: EdgeKind) -> impl Iterator<Item = &DocumentUrl> {
        self.edges
            .iter()
            .filter(move |edge| edge.kind == kind)
            .filter_map(|edge| match &edge.target {
                EdgeTarget::Document(url) => Some(url),
                EdgeTarget::External(_) => None,
            })
    }
}

/// All documents of a run and the edges between them
#[derive(Debug, Default)]
pub struct DocumentGraph {
    documents: FxIndexMap<DocumentUrl, Document>,
    /// Documents consumed as a whole: namespace imports and dynamic imports
    namespace_targets: FxHashSet<DocumentUrl>,
    graph: DiGraph<DocumentUrl, EdgeKind>,
    node_indices: FxHashMap<DocumentUrl, NodeIndex>,
}

impl DocumentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a loaded document; its edges are attached with [`Self::add_edge`]
    pub fn add_document(&mut self, url: DocumentUrl, module: ParsedModule) {
        if !self.node_indices.contains_key(&url) {
            let node = self.graph.add_node(url.clone());
            self.node_indices.insert(url.clone(), node);
        }
        self.documents.insert(
            url.clone(),
            Document {
                url,
                module,
                edges: Vec::new(),
            },
        );
    }

    /// Record a resolved edge of `from`
    pub fn add_edge(&mut self, from: &DocumentUrl, edge: ResolvedEdge) {
        if let EdgeTarget::Document(target) = &edge.target {
            let target_node = match self.node_indices.get(target) {
                Some(&node) => node,
                None => {
                    let node = self.graph.add_node(target.clone());
                    self.node_indices.insert(target.clone(), node);
                    node
                }
            };
            if let Some(&from_node) = self.node_indices.get(from) {
                self.graph.add_edge(from_node, target_node, edge.kind);
            }
        }
        if let Some(document) = self.documents.get_mut(from) {
            document.edges.push(edge);
        }
    }

    pub(crate) fn mark_namespace_target(&mut self, url: DocumentUrl) {
        self.namespace_targets.insert(url);
    }

    pub fn document(&self, url: &DocumentUrl) -> Option<&Document> {
        self.documents.get(url)
    }

    pub fn contains(&self, url: &DocumentUrl) -> bool {
        self.documents.contains_key(url)
    }

    /// Documents in load order
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Whether some document imports `url` as a namespace or dynamically
    pub fn is_namespace_target(&self, url: &DocumentUrl) -> bool {
        self.namespace_targets.contains(url)
    }

    /// Groups of documents that import each other eagerly in a cycle
    ///
    /// A document importing itself counts as a cycle of one.
    pub fn eager_cycles(&self) -> Vec<Vec<DocumentUrl>> {
        let eager = EdgeFiltered::from_fn(&self.graph, |edge| edge.weight().is_eager());
        let cycles: Vec<Vec<DocumentUrl>> = tarjan_scc(&eager)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component.first().is_some_and(|&node| {
                        self.graph
                            .edges_connecting(node, node)
                            .any(|edge| edge.weight().is_eager())
                    })
            })
            .map(|component| {
                let mut urls: Vec<DocumentUrl> =
                    component.into_iter().map(|node| self.graph[node].clone()).collect();
                urls.sort();
                urls
            })
            .collect();

        if !cycles.is_empty() {
            debug!("Found {} eager import cycle(s)", cycles.len());
        }
        cycles
    }
}
