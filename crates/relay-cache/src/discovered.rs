//! Source files referenced by relocated cache entries.

use std::collections::BTreeSet;

/// Relative paths (below the build root) seen while relocating.
///
/// Filled by both relocators; read once by the caller after the whole
/// cache tree has been processed to decide which sources get packaged
/// next to the relocated cache. Duplicate inserts collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredSources {
    paths: BTreeSet<String>,
}

impl DiscoveredSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a relative path. Returns `false` if it was already known.
    pub fn insert(&mut self, relative: impl Into<String>) -> bool {
        self.paths.insert(relative.into())
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.paths.contains(relative)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in lexical order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.paths.into_iter().collect()
    }
}

impl Extend<String> for DiscoveredSources {
    fn extend<T: IntoIterator<Item = String>>(&mut self, iter: T) {
        self.paths.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_collapse() {
        let mut found = DiscoveredSources::new();
        assert!(found.insert("api/index.ts"));
        assert!(!found.insert("api/index.ts"));
        found.insert("lib/util.ts");

        assert_eq!(found.len(), 2);
        assert_eq!(
            found.iter().collect::<Vec<_>>(),
            vec!["api/index.ts", "lib/util.ts"]
        );
    }
}
