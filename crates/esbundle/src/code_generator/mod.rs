//! Module linker and rewriter
//!
//! Turns one bundle of the manifest into its final text:
//! - members are emitted in merge order with collision-free names
//! - imports between members of the same bundle disappear
//! - imports of other bundles go through the generated names those bundles export
//! - dynamic imports target bundle URLs and project the namespace object back out
//! - every member's namespace, default and named bindings are exported once

use log::debug;

use crate::{
    bundle_manifest::{Bundle, BundleManifest},
    document_graph::DocumentGraph,
    error::Result,
    url::DocumentUrl,
};

mod emit;
pub mod export_table;
mod linker;
pub mod renamer;


pub use export_table::{ExportKey, ExportTable};
pub use renamer::NameScope;

use linker::Linker;

/// Output of one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenDocument {
    pub url: DocumentUrl,
    pub content: String,
    /// Bundles and excluded documents imported statically, in declaration order
    pub imports: Vec<DocumentUrl>,
    /// External names of the aggregated export declaration
    pub exports: Vec<String>,
    /// Original documents merged into this one, in merge order
    pub members: Vec<DocumentUrl>,
}

/// Merge and relink the members of `bundle`
///
/// `graph` supplies the parsed members and their resolved edges; `manifest`
/// tells where every other document went.
pub fn rewrite_bundle(
    bundle: &Bundle,
    graph: &DocumentGraph,
    manifest: &BundleManifest,
) -> Result<RewrittenDocument> {
    let mut linker = Linker::new(bundle, graph, manifest)?;
    linker.link()?;
    let content = linker.render();

    debug!("Rewrote {} ({} bytes)", bundle.url, content.len());

    Ok(RewrittenDocument {
        url: bundle.url.clone(),
        content,
        imports: linker.sources.keys().cloned().collect(),
        exports: linker
            .export_entries
            .iter()
            .map(|(_, external)| external.clone())
            .collect(),
        members: bundle.members().to_vec(),
    })
}
