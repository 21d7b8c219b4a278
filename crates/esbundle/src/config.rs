//! Bundler options
//!
//! Options are usually read from a TOML table such as:
//!
//! ```toml
//! strategy = "shell"
//! shell = "src/app-shell.js"
//! shared-bundle-prefix = "chunk_"
//! exclude = ["vendor/analytics.js"]
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::{
    bundle_manifest::{BundleStrategy, SharedBundleNaming, SharedBundleStrategy, ShellMergeStrategy},
    url::DocumentUrl,
};

/// Which partitioning strategy a run uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Hoist shared documents into generated shared bundles
    #[default]
    Shared,
    /// Merge shared documents into the shell's bundle
    Shell,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct BundlerOptions {
    pub strategy: StrategyKind,

    /// Shell document, required by the shell strategy
    pub shell: Option<DocumentUrl>,

    /// Hoist every shared document into one shared bundle
    pub merge_shared_bundles: bool,

    pub shared_bundle_prefix: String,

    /// Extension of generated bundle URLs, without the dot; empty for none
    pub shared_bundle_extension: String,

    /// Documents kept out of bundling and imported as they are
    pub exclude: Vec<DocumentUrl>,
}

impl Default for BundlerOptions {
    fn default() -> Self {
        let naming = SharedBundleNaming::default();
        Self {
            strategy: StrategyKind::default(),
            shell: None,
            merge_shared_bundles: false,
            shared_bundle_prefix: naming.prefix,
            shared_bundle_extension: naming.extension,
            exclude: Vec::new(),
        }
    }
}

impl BundlerOptions {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse bundler options")
    }

    /// Options selecting the shell strategy
    pub fn shell(shell: impl Into<DocumentUrl>) -> Self {
        Self {
            strategy: StrategyKind::Shell,
            shell: Some(shell.into()),
            ..Self::default()
        }
    }

    pub fn naming(&self) -> SharedBundleNaming {
        SharedBundleNaming {
            prefix: self.shared_bundle_prefix.clone(),
            extension: self.shared_bundle_extension.clone(),
        }
    }

    /// Build the strategy these options select
    pub fn strategy(&self) -> Result<Box<dyn BundleStrategy>> {
        match self.strategy {
            StrategyKind::Shared => Ok(Box::new(
                SharedBundleStrategy::new()
                    .with_naming(self.naming())
                    .merge_shared_bundles(self.merge_shared_bundles),
            )),
            StrategyKind::Shell => {
                let Some(shell) = &self.shell else {
                    bail!("the shell strategy needs a `shell` document");
                };
                Ok(Box::new(ShellMergeStrategy::new(shell.clone())))
            }
        }
    }
}
