//! Dependency-graph (`*.graph`) relocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::discovered::DiscoveredSources;
use crate::uri::Roots;
use crate::Relocate;

/// A module's resolved import URIs plus the hash used to validate the cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// Resolved dependency URIs. Order is significant.
    pub deps: Vec<String>,

    pub version_hash: String,

    /// Fields this crate does not interpret, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Relocate for DependencyGraph {
    /// Rewrite every dep under the old root in place. Nothing is reordered or removed.
    fn relocate(&mut self, roots: &Roots, found: &mut DiscoveredSources) -> bool {
        roots.rewrite_all(&mut self.deps, found)
    }
}
