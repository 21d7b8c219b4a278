//! Dependency index: which documents each root needs at evaluation time
//!
//! Every requested root, and every document some other document imports
//! dynamically, maps to the set of documents reachable from it over eager edges.
//! Lazy edges never extend a closure; their targets become roots of their own.

use std::{collections::VecDeque, fmt};

use log::{debug, trace, warn};
use rustc_hash::FxHashSet;

use crate::{
    document_graph::DocumentGraph,
    error::Result,
    graph_builder::GraphBuilder,
    provider::DocumentGraphProvider,
    types::{FxIndexMap, FxIndexSet},
    url::DocumentUrl,
};

/// Roots mapped to their eager closures, together with the loaded graph
#[derive(Debug)]
pub struct DependencyIndex {
    /// Requested roots first, then lazily discovered roots in discovery order
    entrypoint_to_deps: FxIndexMap<DocumentUrl, FxIndexSet<DocumentUrl>>,
    requested: FxIndexSet<DocumentUrl>,
    graph: DocumentGraph,
}

impl DependencyIndex {
    /// Compute closures over an already loaded graph
    ///
    /// Every root must be a document of `graph`.
    pub fn from_graph(graph: DocumentGraph, roots: &[DocumentUrl]) -> Self {
        let requested: FxIndexSet<DocumentUrl> = roots.iter().cloned().collect();
        let mut entrypoint_to_deps: FxIndexMap<DocumentUrl, FxIndexSet<DocumentUrl>> =
            FxIndexMap::default();
        let mut pending: VecDeque<DocumentUrl> = requested.iter().cloned().collect();
        let mut known_roots: FxHashSet<DocumentUrl> = requested.iter().cloned().collect();

        while let Some(root) = pending.pop_front() {
            let closure = eager_closure(&graph, &root, |lazy_target| {
                if known_roots.insert(lazy_target.clone()) {
                    trace!("Lazy import of {lazy_target} makes it a root");
                    pending.push_back(lazy_target.clone());
                }
            });
            trace!("{root} needs {} document(s)", closure.len());
            entrypoint_to_deps.insert(root, closure);
        }

        for cycle in graph.eager_cycles() {
            let members: Vec<&str> = cycle.iter().map(DocumentUrl::as_str).collect();
            warn!(
                "Eager import cycle between {}; merge order follows first visit",
                members.join(", ")
            );
        }

        debug!(
            "Dependency index has {} root(s), {} of them lazily discovered",
            entrypoint_to_deps.len(),
            entrypoint_to_deps.len() - requested.len()
        );

        Self {
            entrypoint_to_deps,
            requested,
            graph,
        }
    }

    /// All roots: requested first, then lazily discovered, in first-seen order
    pub fn roots(&self) -> impl Iterator<Item = &DocumentUrl> {
        self.entrypoint_to_deps.keys()
    }

    /// The roots the caller asked for
    pub fn requested_roots(&self) -> impl Iterator<Item = &DocumentUrl> {
        self.requested.iter()
    }

    /// Roots discovered only through lazy edges
    pub fn lazy_roots(&self) -> impl Iterator<Item = &DocumentUrl> {
        self.entrypoint_to_deps
            .keys()
            .filter(|root| !self.requested.contains(*root))
    }

    pub fn is_root(&self, url: &DocumentUrl) -> bool {
        self.entrypoint_to_deps.contains_key(url)
    }

    pub fn closure(&self, root: &DocumentUrl) -> Option<&FxIndexSet<DocumentUrl>> {
        self.entrypoint_to_deps.get(root)
    }

    /// Roots with their closures in root order
    pub fn entries(&self) -> impl Iterator<Item = (&DocumentUrl, &FxIndexSet<DocumentUrl>)> {
        self.entrypoint_to_deps.iter()
    }

    /// Every document that appears in some closure, in root-then-visit order
    pub fn documents(&self) -> FxIndexSet<&DocumentUrl> {
        self.entrypoint_to_deps.values().flatten().collect()
    }

    pub fn graph(&self) -> &DocumentGraph {
        &self.graph
    }

    pub fn into_graph(self) -> DocumentGraph {
        self.graph
    }

    pub fn len(&self) -> usize {
        self.entrypoint_to_deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entrypoint_to_deps.is_empty()
    }
}

/// One line per root, roots and members sorted: `root: dep, dep`
impl fmt::Display for DependencyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.entrypoint_to_deps.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (root, closure) in entries {
            let mut members: Vec<&str> = closure.iter().map(DocumentUrl::as_str).collect();
            members.sort_unstable();
            writeln!(f, "{root}: {}", members.join(", "))?;
        }
        Ok(())
    }
}

/// Breadth-first walk over eager edges, reporting lazy targets as they appear
fn eager_closure(
    graph: &DocumentGraph,
    root: &DocumentUrl,
    mut on_lazy: impl FnMut(&DocumentUrl),
) -> FxIndexSet<DocumentUrl> {
    let mut visited: FxIndexSet<DocumentUrl> = FxIndexSet::default();
    let mut queue: VecDeque<&DocumentUrl> = VecDeque::new();
    visited.insert(root.clone());
    queue.push_back(root);

    while let Some(url) = queue.pop_front() {
        let Some(document) = graph.document(url) else {
            continue;
        };
        for target in document.lazy_dependencies() {
            on_lazy(target);
        }
        for target in document.eager_dependencies() {
            if visited.insert(target.clone()) {
                queue.push_back(target);
            }
        }
    }

    visited
}

/// Builder for a dependency index, loading the graph through a provider
#[derive(Debug)]
pub struct DependencyIndexBuilder<'a, P: ?Sized> {
    loader: GraphBuilder<'a, P>,
}

impl<'a, P: DocumentGraphProvider + ?Sized> DependencyIndexBuilder<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            loader: GraphBuilder::new(provider),
        }
    }

    /// Leave these documents out of the graph entirely
    #[must_use]
    pub fn exclude(mut self, urls: impl IntoIterator<Item = DocumentUrl>) -> Self {
        self.loader = self.loader.exclude(urls);
        self
    }

    pub fn build(&self, roots: &[DocumentUrl]) -> Result<DependencyIndex> {
        let graph = self.loader.build(roots)?;
        Ok(DependencyIndex::from_graph(graph, roots))
    }
}

/// Load the graph reachable from `roots` and compute every root's eager closure
pub fn build_dependency_index<P: DocumentGraphProvider + ?Sized>(
    roots: &[DocumentUrl],
    provider: &P,
) -> Result<DependencyIndex> {
    DependencyIndexBuilder::new(provider).build(roots)
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::{
        ast::ParsedModule,
        ast_builder::{code, dynamic_import, expr, import},
        error::BundleError,
        provider::InMemoryProvider,
    };

    fn imports(specifiers: &[&str]) -> ParsedModule {
        ParsedModule::new(
            specifiers
                .iter()
                .map(|specifier| import(specifier).build())
                .collect(),
        )
    }

    fn lazy(specifier: &str) -> ParsedModule {
        ParsedModule::new(vec![expr(
            code("").then_dynamic(dynamic_import(specifier)).then_text(";"),
        )])
    }

    fn roots(urls: &[&str]) -> Vec<DocumentUrl> {
        urls.iter().copied().map(DocumentUrl::from).collect()
    }

    #[test]
    fn test_endpoints_sharing_common_dependency() {
        let provider = InMemoryProvider::new()
            .with("common.js", ParsedModule::default())
            .with("dep1.js", imports(&["./common.js"]))
            .with("dep2.js", imports(&["./common.js"]))
            .with("endpoint1.js", imports(&["./common.js", "./dep1.js"]))
            .with(
                "endpoint2.js",
                imports(&["./common.js", "./dep2.js", "./endpoint1.js"]),
            );

        let index = build_dependency_index(
            &roots(&["common.js", "endpoint1.js", "endpoint2.js"]),
            &provider,
        )
        .expect("index should build");

        assert_snapshot!(index.to_string(), @r"
        common.js: common.js
        endpoint1.js: common.js, dep1.js, endpoint1.js
        endpoint2.js: common.js, dep1.js, dep2.js, endpoint1.js, endpoint2.js
        ");
        assert_eq!(index.lazy_roots().count(), 0);
    }

    #[test]
    fn test_lazy_targets_become_independent_roots() {
        let provider = InMemoryProvider::new()
            .with("app.js", ParsedModule::new(vec![
                import("./shell.js").build(),
                expr(code("").then_dynamic(dynamic_import("./page.js")).then_text(";")),
            ]))
            .with("shell.js", ParsedModule::default())
            .with("page.js", ParsedModule::new(vec![
                import("./widget.js").build(),
                expr(code("").then_dynamic(dynamic_import("./dialog.js")).then_text(";")),
            ]))
            .with("widget.js", ParsedModule::default())
            .with("dialog.js", imports(&["./shell.js"]));

        let index = build_dependency_index(&roots(&["app.js"]), &provider)
            .expect("index should build");

        let order: Vec<&str> = index.roots().map(DocumentUrl::as_str).collect();
        assert_eq!(order, ["app.js", "page.js", "dialog.js"]);
        let lazy_roots: Vec<&str> = index.lazy_roots().map(DocumentUrl::as_str).collect();
        assert_eq!(lazy_roots, ["page.js", "dialog.js"]);

        assert_snapshot!(index.to_string(), @r"
        app.js: app.js, shell.js
        dialog.js: dialog.js, shell.js
        page.js: page.js, widget.js
        ");
    }

    #[test]
    fn test_eager_cycles_terminate() {
        let provider = InMemoryProvider::new()
            .with("a.js", imports(&["./b.js"]))
            .with("b.js", imports(&["./c.js"]))
            .with("c.js", imports(&["./a.js"]));

        let index =
            build_dependency_index(&roots(&["a.js"]), &provider).expect("cycles are legal");
        let closure = index.closure(&"a.js".into()).expect("a.js is a root");
        let members: Vec<&str> = closure.iter().map(DocumentUrl::as_str).collect();
        assert_eq!(members, ["a.js", "b.js", "c.js"]);
    }

    #[test]
    fn test_lazy_import_of_existing_root_adds_nothing() {
        let provider = InMemoryProvider::new()
            .with("a.js", lazy("./b.js"))
            .with("b.js", lazy("./a.js"));

        let index =
            build_dependency_index(&roots(&["a.js", "b.js"]), &provider).expect("index builds");
        assert_eq!(index.len(), 2);
        assert_eq!(index.lazy_roots().count(), 0);
        assert_eq!(index.closure(&"a.js".into()).map(|closure| closure.len()), Some(1));
    }

    #[test]
    fn test_closures_compare_as_sets() {
        let provider = InMemoryProvider::new()
            .with("a.js", imports(&["./y.js", "./x.js"]))
            .with("x.js", ParsedModule::default())
            .with("y.js", ParsedModule::default());
        let index = build_dependency_index(&roots(&["a.js"]), &provider).expect("index builds");

        let expected: FxIndexSet<DocumentUrl> = ["x.js", "y.js", "a.js"]
            .into_iter()
            .map(DocumentUrl::from)
            .collect();
        assert_eq!(index.closure(&"a.js".into()), Some(&expected));
    }

    #[test]
    fn test_unresolvable_edge_is_an_error() {
        let provider = InMemoryProvider::new().with("a.js", imports(&["./missing.js"]));
        let err = build_dependency_index(&roots(&["a.js"]), &provider)
            .expect_err("missing.js cannot be resolved");
        assert!(matches!(
            err,
            BundleError::Resolution { ref specifier, .. } if specifier == "./missing.js"
        ));
    }

    #[test]
    fn test_excluded_documents_are_left_out() {
        let provider = InMemoryProvider::new().with("a.js", imports(&["./vendor.js"]));
        let index = DependencyIndexBuilder::new(&provider)
            .exclude([DocumentUrl::new("vendor.js")])
            .build(&roots(&["a.js"]))
            .expect("excluded documents need no resolution");
        assert_snapshot!(index.to_string(), @"a.js: a.js");
    }
}
