//! Partitioning strategies
//!
//! A strategy decides, for every document of the dependency index, which
//! bundle URL it is emitted into. Strategies only produce the assignment; the
//! manifest generator validates it and derives member order.

use std::fmt;

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    deps_index::DependencyIndex,
    error::{BundleError, Result},
    types::FxIndexMap,
    url::{DocumentUrl, common_directory},
};

/// Document URL mapped to the URL of the bundle it lands in
pub type Assignment = FxIndexMap<DocumentUrl, DocumentUrl>;

/// Policy turning a dependency index into a document-to-bundle assignment
pub trait BundleStrategy: fmt::Debug {
    /// Assign every document of `index`; `roots` are the requested roots in order
    fn assign(&self, index: &DependencyIndex, roots: &[DocumentUrl]) -> Result<Assignment>;
}

impl<S: BundleStrategy + ?Sized> BundleStrategy for Box<S> {
    fn assign(&self, index: &DependencyIndex, roots: &[DocumentUrl]) -> Result<Assignment> {
        (**self).assign(index, roots)
    }
}

/// How generated shared bundles are named
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedBundleNaming {
    pub prefix: String,
    /// Extension without the dot; empty for none
    pub extension: String,
}

impl Default for SharedBundleNaming {
    fn default() -> Self {
        Self {
            prefix: "shared_bundle_".to_owned(),
            extension: "js".to_owned(),
        }
    }
}

/// Sequential shared-bundle URLs for one run
///
/// URLs live in the deepest directory common to the requested roots and are
/// numbered from 1. A number whose URL is already taken by a real document,
/// loaded or excluded, is skipped.
#[derive(Debug)]
pub struct SharedBundleUrls<'a> {
    naming: &'a SharedBundleNaming,
    directory: String,
    taken: FxHashSet<&'a DocumentUrl>,
    next: usize,
}

impl<'a> SharedBundleUrls<'a> {
    pub fn new(
        naming: &'a SharedBundleNaming,
        roots: &[DocumentUrl],
        index: &'a DependencyIndex,
    ) -> Self {
        Self {
            naming,
            directory: common_directory(roots),
            taken: index
                .graph()
                .documents()
                .flat_map(|doc| {
                    std::iter::once(&doc.url).chain(doc.edges().iter().map(|edge| edge.target.url()))
                })
                .collect(),
            next: 1,
        }
    }

    pub fn next_url(&mut self) -> DocumentUrl {
        loop {
            let n = self.next;
            self.next += 1;
            let url = if self.naming.extension.is_empty() {
                DocumentUrl::new(format!("{}{}{n}", self.directory, self.naming.prefix))
            } else {
                DocumentUrl::new(format!(
                    "{}{}{n}.{}",
                    self.directory, self.naming.prefix, self.naming.extension
                ))
            };
            if !self.taken.contains(&url) {
                return url;
            }
            trace!("Skipping generated URL {url}, a document already has it");
        }
    }
}

/// Each document with the roots whose bundles would otherwise need it
///
/// Documents are listed in first-seen order of a scan over the roots in index
/// order and each root's closure in visit order. A document that is itself a
/// root is listed with only itself: it always keeps a bundle of its own. Any
/// other document lists every root whose closure contains it, in root order.
pub fn sharing_groups(index: &DependencyIndex) -> FxIndexMap<&DocumentUrl, Vec<&DocumentUrl>> {
    let mut groups: FxIndexMap<&DocumentUrl, Vec<&DocumentUrl>> = FxIndexMap::default();
    for (_, closure) in index.entries() {
        for document in closure {
            if groups.contains_key(document) {
                continue;
            }
            let group = if index.is_root(document) {
                vec![document]
            } else {
                index
                    .entries()
                    .filter(|(_, other)| other.contains(document))
                    .map(|(root, _)| root)
                    .collect()
            };
            groups.insert(document, group);
        }
    }
    groups
}

/// Default strategy: hoist documents needed by several roots into generated bundles
#[derive(Debug, Clone, Default)]
pub struct SharedBundleStrategy {
    naming: SharedBundleNaming,
    merge_shared: bool,
}

impl SharedBundleStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_naming(mut self, naming: SharedBundleNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Put every hoisted document into one shared bundle
    #[must_use]
    pub const fn merge_shared_bundles(mut self, merge: bool) -> Self {
        self.merge_shared = merge;
        self
    }
}

impl BundleStrategy for SharedBundleStrategy {
    fn assign(&self, index: &DependencyIndex, roots: &[DocumentUrl]) -> Result<Assignment> {
        let mut urls = SharedBundleUrls::new(&self.naming, roots, index);
        let mut shared: FxHashMap<Vec<&DocumentUrl>, DocumentUrl> = FxHashMap::default();
        let mut merged: Option<DocumentUrl> = None;
        let mut assignment = Assignment::default();

        for (document, group) in sharing_groups(index) {
            let bundle = match group.as_slice() {
                [owner] => (*owner).clone(),
                _ if self.merge_shared => merged
                    .get_or_insert_with(|| {
                        let url = urls.next_url();
                        debug!("Generated {url} for all shared documents");
                        url
                    })
                    .clone(),
                _ => shared
                    .entry(group.clone())
                    .or_insert_with(|| {
                        let url = urls.next_url();
                        debug!("Generated {url} for documents shared by {}", join(&group));
                        url
                    })
                    .clone(),
            };
            if bundle != *document {
                trace!("{document} -> {bundle}");
            }
            assignment.insert(document.clone(), bundle);
        }

        Ok(assignment)
    }
}

/// Shell strategy: documents needed by several roots go into the shell's bundle
#[derive(Debug, Clone)]
pub struct ShellMergeStrategy {
    shell: DocumentUrl,
}

impl ShellMergeStrategy {
    pub fn new(shell: impl Into<DocumentUrl>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub const fn shell(&self) -> &DocumentUrl {
        &self.shell
    }
}

impl BundleStrategy for ShellMergeStrategy {
    fn assign(&self, index: &DependencyIndex, _roots: &[DocumentUrl]) -> Result<Assignment> {
        if !index.is_root(&self.shell) {
            return Err(BundleError::invariant(format!(
                "shell {} is not one of the bundled roots",
                self.shell
            )));
        }

        let mut assignment = Assignment::default();
        for (document, group) in sharing_groups(index) {
            let bundle = match group.as_slice() {
                [owner] => (*owner).clone(),
                _ => {
                    debug!(
                        "Merging {document} into shell {}, shared by {}",
                        self.shell,
                        join(&group)
                    );
                    self.shell.clone()
                }
            };
            assignment.insert(document.clone(), bundle);
        }
        Ok(assignment)
    }
}

fn join(urls: &[&DocumentUrl]) -> String {
    urls.iter()
        .map(|url| url.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
