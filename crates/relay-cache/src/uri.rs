//! Root-prefix matching shared by both relocators.

use std::path::Path;

use crate::discovered::DiscoveredSources;

/// Convert an absolute filesystem path into a `file://` URI prefix.
pub fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let trimmed = raw.trim_end_matches('/');
    if trimmed.starts_with('/') {
        format!("file://{}", trimmed)
    } else {
        format!("file:///{}", trimmed)
    }
}

/// Rewrite `value` from the `from` root to the `to` root.
///
/// Matches only when `value` is `from + "/" + suffix` with a non-empty
/// suffix, so `file:///app2/x` is not under `file:///app`. Returns the
/// rewritten string and the suffix.
pub fn relocate_uri(value: &str, from: &str, to: &str) -> Option<(String, String)> {
    let from = from.trim_end_matches('/');
    let to = to.trim_end_matches('/');

    let suffix = value.strip_prefix(from)?.strip_prefix('/')?;
    if suffix.is_empty() {
        return None;
    }

    Some((format!("{}/{}", to, suffix), suffix.to_string()))
}

/// Old-root prefix and new-root replacement for one relocation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    pub from: String,
    pub to: String,
}

impl Roots {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Prefixes for relocating `file://` references between two absolute paths.
    pub fn from_paths(old_root: &Path, new_root: &Path) -> Self {
        Self::new(file_uri(old_root), file_uri(new_root))
    }

    /// The same roots with direction reversed.
    pub fn reversed(&self) -> Self {
        Self::new(self.to.clone(), self.from.clone())
    }

    /// Rewrite one string in place, recording the suffix. Returns whether it changed.
    pub(crate) fn rewrite(&self, value: &mut String, found: &mut DiscoveredSources) -> bool {
        match relocate_uri(value, &self.from, &self.to) {
            Some((rewritten, suffix)) => {
                found.insert(suffix);
                *value = rewritten;
                true
            }
            None => false,
        }
    }

    /// Rewrite every matching element, keeping length and order.
    pub(crate) fn rewrite_all(&self, values: &mut [String], found: &mut DiscoveredSources) -> bool {
        let mut changed = false;
        for value in values.iter_mut() {
            changed |= self.rewrite(value, found);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relocate_uri_match() {
        let (out, suffix) =
            relocate_uri("file:///vercel/path0/api/a.ts", "file:///vercel/path0", "file:///var/task")
                .unwrap();
        assert_eq!(out, "file:///var/task/api/a.ts");
        assert_eq!(suffix, "api/a.ts");
    }

    #[test]
    fn test_relocate_uri_requires_separator() {
        assert!(relocate_uri("file:///app2/x.ts", "file:///app", "file:///t").is_none());
        assert!(relocate_uri("file:///app", "file:///app", "file:///t").is_none());
        assert!(relocate_uri("file:///app/", "file:///app", "file:///t").is_none());
        assert!(relocate_uri("https://deno.land/x.ts", "file:///app", "file:///t").is_none());
    }

    #[test]
    fn test_trailing_slashes_normalized() {
        let (out, _) = relocate_uri("file:///app/a.ts", "file:///app/", "/task/").unwrap();
        assert_eq!(out, "/task/a.ts");
    }

    #[test]
    fn test_file_uri() {
        assert_eq!(file_uri(Path::new("/vercel/path0")), "file:///vercel/path0");
        assert_eq!(file_uri(Path::new("/var/task/")), "file:///var/task");
    }
}
