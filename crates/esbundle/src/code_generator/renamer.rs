//! Per-bundle rename table
//!
//! All module-scope names of a bundle's merged output come from one
//! [`NameScope`]. A name is handed out at most once; later claims of the same
//! base get a `$<n>` suffix. The scope lives exactly as long as the rewrite of
//! its bundle.

use log::trace;
use rustc_hash::FxHashSet;

#[derive(Debug, Default)]
pub struct NameScope {
    used: FxHashSet<String>,
}

impl NameScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a name as taken without handing it out
    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_owned());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Take `base` if free, otherwise the first free `base$<n>`
    pub fn claim(&mut self, base: &str) -> String {
        if self.used.insert(base.to_owned()) {
            return base.to_owned();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}${n}");
            if self.used.insert(candidate.clone()) {
                trace!("Renamed '{base}' to '{candidate}'");
                return candidate;
            }
            n += 1;
        }
    }
}
