//! Bundle manifest: which document is emitted into which bundle
//!
//! The manifest is generated from the dependency index and a
//! [`BundleStrategy`]. Whatever the strategy, the result is checked before it is
//! handed to the linker: every document of every closure sits in exactly one
//! bundle, and every bundle belongs to a root or is a generated shared bundle.

use std::fmt;

use anyhow::Context;
use log::debug;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::{
    deps_index::DependencyIndex,
    document_graph::DocumentGraph,
    error::{BundleError, Result},
    types::{FxIndexMap, FxIndexSet},
    url::DocumentUrl,
};

pub mod strategy;


pub use strategy::{
    Assignment, BundleStrategy, SharedBundleNaming, SharedBundleStrategy, SharedBundleUrls,
    ShellMergeStrategy, sharing_groups,
};

/// One output unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub url: DocumentUrl,
    /// Members in merge order: dependencies before their importers
    members: Vec<DocumentUrl>,
    /// Whether the URL was invented for this run rather than taken from a root
    generated: bool,
}

impl Bundle {
    pub fn members(&self) -> &[DocumentUrl] {
        &self.members
    }

    pub fn contains(&self, url: &DocumentUrl) -> bool {
        self.members.contains(url)
    }

    pub const fn is_generated(&self) -> bool {
        self.generated
    }
}

/// Bundles of one run and the bundle of every document
#[derive(Debug, Clone, Default)]
pub struct BundleManifest {
    /// Root bundles in index order, then generated bundles in numbering order
    bundles: FxIndexMap<DocumentUrl, Bundle>,
    bundle_of: FxIndexMap<DocumentUrl, DocumentUrl>,
}

impl BundleManifest {
    pub fn bundles(&self) -> impl Iterator<Item = &Bundle> {
        self.bundles.values()
    }

    pub fn bundle(&self, url: &DocumentUrl) -> Option<&Bundle> {
        self.bundles.get(url)
    }

    /// URL of the bundle `document` is emitted into
    pub fn bundle_url_for(&self, document: &DocumentUrl) -> Option<&DocumentUrl> {
        self.bundle_of.get(document)
    }

    pub fn bundle_for(&self, document: &DocumentUrl) -> Option<&Bundle> {
        self.bundle_url_for(document)
            .and_then(|url| self.bundles.get(url))
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Serialize the bundle-to-members mapping
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        #[derive(Serialize)]
        struct ManifestFile<'a> {
            bundles: FxIndexMap<&'a str, BundleEntry<'a>>,
        }

        #[derive(Serialize)]
        struct BundleEntry<'a> {
            generated: bool,
            members: Vec<&'a str>,
        }

        let file = ManifestFile {
            bundles: self
                .bundles()
                .map(|bundle| {
                    (
                        bundle.url.as_str(),
                        BundleEntry {
                            generated: bundle.generated,
                            members: bundle.members.iter().map(DocumentUrl::as_str).collect(),
                        },
                    )
                })
                .collect(),
        };
        toml::to_string(&file).context("Failed to serialize bundle manifest")
    }
}

/// One line per bundle in manifest order: `bundle: member, member`
impl fmt::Display for BundleManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bundle in self.bundles() {
            let members: Vec<&str> = bundle.members.iter().map(DocumentUrl::as_str).collect();
            writeln!(f, "{}: {}", bundle.url, members.join(", "))?;
        }
        Ok(())
    }
}

/// Partition the documents of `index` into bundles
pub fn generate_manifest(
    roots: &[DocumentUrl],
    index: &DependencyIndex,
    strategy: &dyn BundleStrategy,
) -> Result<BundleManifest> {
    let assignment = strategy.assign(index, roots)?;
    validate_assignment(index, &assignment)?;

    let mut grouped: FxIndexMap<&DocumentUrl, Vec<&DocumentUrl>> = FxIndexMap::default();
    for root in index.roots() {
        if assignment.values().any(|bundle| bundle == root) {
            grouped.insert(root, Vec::new());
        }
    }
    for (document, bundle) in &assignment {
        grouped.entry(bundle).or_default().push(document);
    }

    let bundles: FxIndexMap<DocumentUrl, Bundle> = grouped
        .into_iter()
        .map(|(url, members)| {
            let bundle = Bundle {
                url: url.clone(),
                members: merge_order(index.graph(), url, &members),
                generated: !index.graph().contains(url),
            };
            (url.clone(), bundle)
        })
        .collect();

    debug!(
        "Manifest has {} bundle(s), {} generated",
        bundles.len(),
        bundles.values().filter(|bundle| bundle.generated).count()
    );

    Ok(BundleManifest {
        bundles,
        bundle_of: assignment,
    })
}

fn validate_assignment(index: &DependencyIndex, assignment: &Assignment) -> Result<()> {
    let documents = index.documents();

    if let Some(missing) = documents
        .iter()
        .find(|document| !assignment.contains_key(**document))
    {
        return Err(BundleError::invariant(format!(
            "{missing} is not assigned to any bundle"
        )));
    }

    for (document, bundle) in assignment {
        if !documents.contains(document) {
            return Err(BundleError::invariant(format!(
                "{document} is assigned to {bundle} but no root needs it"
            )));
        }
        if index.graph().contains(bundle) && !index.is_root(bundle) {
            return Err(BundleError::invariant(format!(
                "{document} is assigned to {bundle}, which is neither a root nor a generated bundle"
            )));
        }
        if index.is_root(bundle) && assignment.get(bundle) != Some(bundle) {
            return Err(BundleError::invariant(format!(
                "bundle {bundle} does not contain its own document"
            )));
        }
    }

    Ok(())
}

/// Order members so eager dependencies come before their importers
///
/// Post-order depth-first walk over eager edges that stay inside the bundle,
/// starting at the bundle's own document and then the remaining members in
/// assignment order. Cycles are cut at the first revisit.
fn merge_order(
    graph: &DocumentGraph,
    bundle: &DocumentUrl,
    members: &[&DocumentUrl],
) -> Vec<DocumentUrl> {
    let member_set: FxIndexSet<&DocumentUrl> = members.iter().copied().collect();
    let mut visited: FxHashSet<&DocumentUrl> = FxHashSet::default();
    let mut order: Vec<DocumentUrl> = Vec::with_capacity(members.len());

    let starts = member_set
        .get(bundle)
        .into_iter()
        .chain(member_set.iter())
        .copied();

    for start in starts {
        if !visited.insert(start) {
            continue;
        }
        let mut stack: Vec<(&DocumentUrl, Vec<&DocumentUrl>)> =
            vec![(start, in_bundle_dependencies(graph, start, &member_set))];

        while let Some((url, pending)) = stack.last_mut() {
            if let Some(next) = pending.pop() {
                if visited.insert(next) {
                    let deps = in_bundle_dependencies(graph, next, &member_set);
                    stack.push((next, deps));
                }
            } else {
                order.push((*url).clone());
                stack.pop();
            }
        }
    }

    order
}

/// Eager dependencies of `url` inside the bundle, reversed for popping in source order
fn in_bundle_dependencies<'a>(
    graph: &'a DocumentGraph,
    url: &DocumentUrl,
    members: &FxIndexSet<&'a DocumentUrl>,
) -> Vec<&'a DocumentUrl> {
    let Some(document) = graph.document(url) else {
        return Vec::new();
    };
    let mut deps: Vec<&DocumentUrl> = document
        .eager_dependencies()
        .filter_map(|dep| members.get(dep).copied())
        .collect();
    deps.reverse();
    deps
}
