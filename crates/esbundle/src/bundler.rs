//! Bundling pipeline: dependency index, manifest, then one rewrite per bundle

use log::{info, warn};

use crate::{
    bundle_manifest::{BundleManifest, BundleStrategy, generate_manifest},
    code_generator::{RewrittenDocument, rewrite_bundle},
    config::BundlerOptions,
    deps_index::{DependencyIndex, DependencyIndexBuilder},
    error::Result,
    provider::DocumentGraphProvider,
    types::FxIndexMap,
    url::DocumentUrl,
};

/// Everything one bundling run produces
#[derive(Debug)]
pub struct BundleOutput {
    pub index: DependencyIndex,
    pub manifest: BundleManifest,
    /// Rewritten bundles in manifest order
    pub documents: FxIndexMap<DocumentUrl, RewrittenDocument>,
}

#[derive(Debug)]
pub struct Bundler {
    options: BundlerOptions,
    strategy: Box<dyn BundleStrategy>,
}

impl Bundler {
    /// Bundler using the strategy `options` select
    pub fn new(options: BundlerOptions) -> anyhow::Result<Self> {
        let strategy = options.strategy()?;
        Ok(Self { options, strategy })
    }

    /// Bundler using a custom strategy; the strategy fields of `options` are ignored
    pub fn with_strategy(options: BundlerOptions, strategy: impl BundleStrategy + 'static) -> Self {
        Self {
            options,
            strategy: Box::new(strategy),
        }
    }

    pub const fn options(&self) -> &BundlerOptions {
        &self.options
    }

    /// Run all stages for `roots`
    pub fn bundle<P: DocumentGraphProvider + ?Sized>(
        &self,
        roots: &[DocumentUrl],
        provider: &P,
    ) -> Result<BundleOutput> {
        let roots: Vec<DocumentUrl> = roots
            .iter()
            .filter(|root| {
                let excluded = self.options.exclude.contains(root);
                if excluded {
                    warn!("Root {root} is excluded from bundling and will be skipped");
                }
                !excluded
            })
            .cloned()
            .collect();

        let index = DependencyIndexBuilder::new(provider)
            .exclude(self.options.exclude.iter().cloned())
            .build(&roots)?;
        let manifest = generate_manifest(&roots, &index, self.strategy.as_ref())?;

        let documents = rewrite_all(&index, &manifest)?;

        info!(
            "Bundled {} document(s) from {} root(s) into {} bundle(s)",
            index.graph().len(),
            roots.len(),
            documents.len()
        );

        Ok(BundleOutput {
            index,
            manifest,
            documents,
        })
    }
}

/// Bundle `roots` with `strategy` and return the rewritten bundles by URL
pub fn bundle<P: DocumentGraphProvider + ?Sized>(
    roots: &[DocumentUrl],
    provider: &P,
    strategy: &dyn BundleStrategy,
) -> Result<FxIndexMap<DocumentUrl, RewrittenDocument>> {
    let index = DependencyIndexBuilder::new(provider).build(roots)?;
    let manifest = generate_manifest(roots, &index, strategy)?;
    rewrite_all(&index, &manifest)
}

fn rewrite_all(
    index: &DependencyIndex,
    manifest: &BundleManifest,
) -> Result<FxIndexMap<DocumentUrl, RewrittenDocument>> {
    manifest
        .bundles()
        .map(|bundle| {
            rewrite_bundle(bundle, index.graph(), manifest)
                .map(|document| (document.url.clone(), document))
        })
        .collect()
}
