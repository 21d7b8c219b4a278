//! Shared type definitions for the esbundle crate
//!
//! This module contains common types that are used across multiple components
//! of the bundler, ensuring consistency and avoiding circular dependencies.

use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;

/// Insertion-ordered map using the Fx hasher
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Insertion-ordered set using the Fx hasher
pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// Classification of an edge between two documents
///
/// Eager edges come from static `import`/`export ... from` declarations and are
/// evaluated before the importing module runs. Lazy edges come from dynamic
/// `import()` expressions and load on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Eager,
    Lazy,
}

impl EdgeKind {
    /// Check if this is an eager (static) edge
    pub const fn is_eager(self) -> bool {
        matches!(self, Self::Eager)
    }

    /// Check if this is a lazy (dynamic) edge
    pub const fn is_lazy(self) -> bool {
        matches!(self, Self::Lazy)
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eager => write!(f, "eager"),
            Self::Lazy => write!(f, "lazy"),
        }
    }
}
