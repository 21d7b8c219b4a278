//! ES module bundler core
//!
//! Given entry documents connected by static and dynamic imports, the crate
//! computes which documents each entry needs, partitions the graph into bundles
//! and relinks the merged documents so they behave like the originals.

pub mod ast;
pub mod ast_builder;
pub mod bundle_manifest;
pub mod bundler;
pub mod code_generator;
pub mod config;
pub mod deps_index;
pub mod document_graph;
pub mod error;
pub mod graph_builder;
pub mod provider;
pub mod types;
pub mod url;

pub use bundle_manifest::{
    Bundle, BundleManifest, BundleStrategy, SharedBundleStrategy, ShellMergeStrategy,
    generate_manifest,
};
pub use bundler::{BundleOutput, Bundler, bundle};
pub use code_generator::{RewrittenDocument, rewrite_bundle};
pub use config::BundlerOptions;
pub use deps_index::{DependencyIndex, build_dependency_index};
pub use error::{BundleError, Result};
pub use provider::{DocumentGraphProvider, InMemoryProvider};
pub use url::DocumentUrl;
