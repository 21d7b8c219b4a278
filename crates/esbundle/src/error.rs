//! Error kinds surfaced by the bundling stages.

use crate::url::DocumentUrl;

pub type Result<T, E = BundleError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// An edge specifier could not be resolved to a document.
    #[error("could not resolve '{specifier}' imported by {importer}")]
    Resolution {
        specifier: String,
        importer: DocumentUrl,
    },

    /// The graph provider failed to load a resolved document.
    #[error("failed to load {url}")]
    Load {
        url: DocumentUrl,
        #[source]
        source: anyhow::Error,
    },

    /// A bundle strategy produced an assignment that breaks the manifest contract.
    #[error("bundle manifest invariant violated: {0}")]
    Invariant(String),

    /// A reference names a binding its target does not export.
    #[error("'{binding}' is not exported by {target} (referenced from {importer})")]
    Link {
        binding: String,
        importer: DocumentUrl,
        target: DocumentUrl,
    },

    /// A chain of re-exports loops back on itself.
    #[error("circular re-export of '{binding}' through {exporter}")]
    CircularReexport {
        binding: String,
        exporter: DocumentUrl,
    },
}

impl BundleError {
    pub(crate) fn unresolved(specifier: &str, importer: &DocumentUrl) -> Self {
        Self::Resolution {
            specifier: specifier.to_owned(),
            importer: importer.clone(),
        }
    }

    pub(crate) fn missing_export(
        binding: &str,
        importer: &DocumentUrl,
        target: &DocumentUrl,
    ) -> Self {
        Self::Link {
            binding: binding.to_owned(),
            importer: importer.clone(),
            target: target.clone(),
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }
}
