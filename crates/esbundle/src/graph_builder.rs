//! Graph builder that loads a DocumentGraph through a provider
//!
//! Starting from the roots, every document reachable over eager or lazy edges is
//! loaded exactly once and each of its edges resolved. A specifier that resolves
//! to nothing aborts the build; silently dropping an edge would produce bundles
//! missing code.

use std::collections::VecDeque;

use log::{debug, trace};
use rustc_hash::FxHashSet;

use crate::{
    ast::ParsedModule,
    document_graph::{DocumentGraph, EdgeTarget, ResolvedEdge},
    error::{BundleError, Result},
    provider::DocumentGraphProvider,
    url::DocumentUrl,
};

/// Loads the documents of one bundling run
#[derive(Debug)]
pub struct GraphBuilder<'a, P: ?Sized> {
    provider: &'a P,
    excluded: FxHashSet<DocumentUrl>,
}

impl<'a, P: DocumentGraphProvider + ?Sized> GraphBuilder<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self {
            provider,
            excluded: FxHashSet::default(),
        }
    }

    /// Treat these documents as external: never loaded, never bundled
    #[must_use]
    pub fn exclude(mut self, urls: impl IntoIterator<Item = DocumentUrl>) -> Self {
        self.excluded.extend(urls);
        self
    }

    pub fn is_excluded(&self, url: &DocumentUrl) -> bool {
        self.excluded.contains(url)
    }

    /// Load everything reachable from `roots`
    pub fn build(&self, roots: &[DocumentUrl]) -> Result<DocumentGraph> {
        let mut graph = DocumentGraph::new();
        let mut queued: FxHashSet<DocumentUrl> = FxHashSet::default();
        let mut queue: VecDeque<DocumentUrl> = VecDeque::new();

        for root in roots {
            if queued.insert(root.clone()) {
                queue.push_back(root.clone());
            }
        }

        while let Some(url) = queue.pop_front() {
            let module = self
                .provider
                .load(&url)
                .map_err(|source| BundleError::Load {
                    url: url.clone(),
                    source,
                })?;
            trace!("Loaded {url} with {} statement(s)", module.body.len());

            let edges = self.resolve_edges(&url, &module)?;
            let namespace_targets: FxHashSet<String> = namespace_specifiers(&module)
                .into_iter()
                .map(str::to_owned)
                .collect();
            graph.add_document(url.clone(), module);

            for edge in edges {
                if let EdgeTarget::Document(target) = &edge.target {
                    if namespace_targets.contains(edge.specifier.as_str()) {
                        graph.mark_namespace_target(target.clone());
                    }
                    if queued.insert(target.clone()) {
                        queue.push_back(target.clone());
                    }
                }
                graph.add_edge(&url, edge);
            }
        }

        debug!(
            "Loaded {} document(s) from {} root(s)",
            graph.len(),
            roots.len()
        );
        Ok(graph)
    }

    fn resolve_edges(&self, url: &DocumentUrl, module: &ParsedModule) -> Result<Vec<ResolvedEdge>> {
        module
            .dependencies()
            .into_iter()
            .map(|dependency| {
                let target = self.resolve(&dependency.specifier, url)?;
                trace!(
                    "{url} -> {} ({}, '{}')",
                    target.url(),
                    dependency.kind,
                    dependency.specifier
                );
                Ok(ResolvedEdge {
                    specifier: dependency.specifier,
                    target,
                    kind: dependency.kind,
                })
            })
            .collect()
    }

    fn resolve(&self, specifier: &str, from: &DocumentUrl) -> Result<EdgeTarget> {
        match self.provider.resolve(specifier, from) {
            Some(url) if self.is_excluded(&url) => Ok(EdgeTarget::External(url)),
            Some(url) => Ok(EdgeTarget::Document(url)),
            None => {
                // Excluded documents need not be known to the provider at all.
                let joined = from.join(specifier);
                if self.is_excluded(&joined) {
                    Ok(EdgeTarget::External(joined))
                } else {
                    Err(BundleError::unresolved(specifier, from))
                }
            }
        }
    }
}

/// Specifiers whose target is consumed as a whole module object
fn namespace_specifiers(module: &ParsedModule) -> FxHashSet<&str> {
    let mut specifiers: FxHashSet<&str> = module
        .imports()
        .filter(|import| import.namespace.is_some())
        .map(|import| import.specifier.as_str())
        .collect();
    specifiers.extend(
        module
            .dynamic_imports()
            .into_iter()
            .map(|dynamic| dynamic.specifier.as_str()),
    );
    specifiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast_builder::{code, dynamic_import, expr, import},
        provider::InMemoryProvider,
    };

    fn provider() -> InMemoryProvider {
        InMemoryProvider::new()
            .with(
                "a.js",
                ParsedModule::new(vec![
                    import("./b.js").namespace("b").build(),
                    expr(code("").then_dynamic(dynamic_import("./c.js")).then_text(";")),
                ]),
            )
            .with(
                "b.js",
                ParsedModule::new(vec![import("./vendor/big.js").named("big").build()]),
            )
            .with("c.js", ParsedModule::default())
    }

    #[test]
    fn test_build_loads_eager_and_lazy_targets() {
        let provider = provider().with("vendor/big.js", ParsedModule::default());
        let graph = GraphBuilder::new(&provider)
            .build(&["a.js".into()])
            .expect("graph should load");

        let urls: Vec<&str> = graph.documents().map(|doc| doc.url.as_str()).collect();
        assert_eq!(urls, ["a.js", "b.js", "c.js", "vendor/big.js"]);
        assert!(graph.is_namespace_target(&"b.js".into()));
        assert!(graph.is_namespace_target(&"c.js".into()));
        assert!(!graph.is_namespace_target(&"vendor/big.js".into()));
    }

    #[test]
    fn test_excluded_documents_become_external() {
        let provider = provider();
        let graph = GraphBuilder::new(&provider)
            .exclude([DocumentUrl::new("vendor/big.js")])
            .build(&["a.js".into()])
            .expect("excluded target must not need resolving");

        assert!(!graph.contains(&"vendor/big.js".into()));
        let b = graph.document(&"b.js".into()).expect("b.js is loaded");
        assert_eq!(
            b.resolve("./vendor/big.js"),
            Some(&EdgeTarget::External("vendor/big.js".into()))
        );
    }

    #[test]
    fn test_unresolved_specifier_fails() {
        let provider = provider();
        let err = GraphBuilder::new(&provider)
            .build(&["a.js".into()])
            .expect_err("vendor/big.js is not registered");

        match err {
            BundleError::Resolution {
                specifier,
                importer,
            } => {
                assert_eq!(specifier, "./vendor/big.js");
                assert_eq!(importer.as_str(), "b.js");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
