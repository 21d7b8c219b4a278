//! External names a bundle exports for its members
//!
//! Other bundles import a member's bindings through these names, so the table
//! depends only on the bundle's own members and can be computed by any bundle
//! that imports from it.

use super::renamer::NameScope;
use crate::{
    bundle_manifest::Bundle,
    document_graph::{Document, DocumentGraph},
    types::FxIndexMap,
    url::{DocumentUrl, make_legal_identifier},
};

/// Which binding of a member an external name stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExportKey {
    /// The member's namespace object
    Namespace,
    /// The member's default export
    Default,
    /// A named export, by its exported name
    Named(String),
}

#[derive(Debug, Clone)]
pub struct ExportTable {
    names: FxIndexMap<(DocumentUrl, ExportKey), String>,
}

impl ExportTable {
    /// Claim external names for every member in merge order
    ///
    /// Per member: `$<stem>` for the namespace object, `$<stem>Default` for the
    /// default export, then named exports under their own name. A name already
    /// claimed in this bundle gets a `$<n>` suffix.
    pub fn for_bundle(bundle: &Bundle, graph: &DocumentGraph) -> Self {
        let mut claimed = NameScope::new();
        let mut names = FxIndexMap::default();

        for document in bundle
            .members()
            .iter()
            .filter_map(|member| graph.document(member))
        {
            let stem = make_legal_identifier(document.url.stem());
            if has_namespace(graph, document) {
                let name = claimed.claim(&format!("${stem}"));
                names.insert((document.url.clone(), ExportKey::Namespace), name);
            }
            let exports = document.module.exports();
            if exports.contains_key("default") {
                let name = claimed.claim(&format!("${stem}Default"));
                names.insert((document.url.clone(), ExportKey::Default), name);
            }
            for exported in exports.keys().filter(|name| *name != "default") {
                let name = claimed.claim(exported);
                names.insert(
                    (document.url.clone(), ExportKey::Named(exported.clone())),
                    name,
                );
            }
        }

        Self { names }
    }

    pub fn external_name(&self, document: &DocumentUrl, key: &ExportKey) -> Option<&str> {
        self.names
            .get(&(document.clone(), key.clone()))
            .map(String::as_str)
    }

    /// Entries in aggregated-export order
    ///
    /// Namespace and default entries come first, by member URL; named entries
    /// follow, by member URL and then in declaration order.
    pub fn sorted_entries(&self) -> Vec<(&DocumentUrl, &ExportKey, &str)> {
        let mut entries: Vec<(&DocumentUrl, &ExportKey, &str)> = self
            .names
            .iter()
            .map(|((url, key), name)| (url, key, name.as_str()))
            .collect();
        entries.sort_by_key(|&(url, key, _)| (matches!(key, ExportKey::Named(_)), url));
        entries
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Whether a member gets a namespace object in its bundle
///
/// Members with exports always do; so does any document that some other
/// document imports as a namespace or dynamically.
pub fn has_namespace(graph: &DocumentGraph, document: &Document) -> bool {
    graph.is_namespace_target(&document.url) || !document.module.exports().is_empty()
}
