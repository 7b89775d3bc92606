//! Cache directory traversal, artifact move and empty-directory pruning.
//!
//! # Cache Structure
//!
//! ```text
//! <cache_root>/
//!   deps/...                       # remote modules, may hold *.graph files
//!   gen/file/<old_root>/...        # per-source artifacts (*.js, *.graph, *.buildinfo)
//! ```
//!
//! After a run the artifacts live under `gen/file/<new_root>/` and every
//! cache file references the new root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use crate::buildinfo::BuildInfo;
use crate::discovered::DiscoveredSources;
use crate::error::{CacheError, CacheResult};
use crate::graph::DependencyGraph;
use crate::uri::Roots;
use crate::Relocate;

/// Cache files the mover knows how to relocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFileKind {
    Graph,
    BuildInfo,
}

impl CacheFileKind {
    /// Classify a path by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("graph") => Some(Self::Graph),
            Some("buildinfo") => Some(Self::BuildInfo),
            _ => None,
        }
    }
}

/// Summary of one mover run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelocationReport {
    /// Cache files visited (graph + build-info).
    pub files_scanned: usize,
    /// Cache files written back because a reference changed.
    pub files_rewritten: usize,
    /// Direct children moved from the old artifact directory.
    pub entries_moved: usize,
    /// Directories removed while pruning.
    pub dirs_pruned: usize,
}

/// Relocates a whole cache directory from one absolute root to another.
#[derive(Debug, Clone)]
pub struct CacheFileMover {
    cache_root: PathBuf,
    old_root: PathBuf,
    new_root: PathBuf,
    roots: Roots,
}

impl CacheFileMover {
    pub fn new(
        cache_root: impl Into<PathBuf>,
        old_root: impl Into<PathBuf>,
        new_root: impl Into<PathBuf>,
    ) -> CacheResult<Self> {
        let old_root = old_root.into();
        let new_root = new_root.into();

        for root in [&old_root, &new_root] {
            if !root.is_absolute() {
                return Err(CacheError::InvalidRoot {
                    message: format!("{} is not absolute", root.display()),
                });
            }
        }
        if old_root == new_root {
            return Err(CacheError::InvalidRoot {
                message: format!("old and new root are both {}", old_root.display()),
            });
        }

        let roots = Roots::from_paths(&old_root, &new_root);
        Ok(Self {
            cache_root: cache_root.into(),
            old_root,
            new_root,
            roots,
        })
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn roots(&self) -> &Roots {
        &self.roots
    }

    /// Directory holding per-source artifacts, keyed by absolute source path.
    pub fn gen_root(&self) -> PathBuf {
        self.cache_root.join("gen").join("file")
    }

    /// Artifact directory for sources under `root`.
    pub fn artifact_dir(&self, root: &Path) -> PathBuf {
        let relative: PathBuf = root
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        self.gen_root().join(relative)
    }

    /// Relocate every cache file, move the artifacts, then prune.
    pub async fn run(&self, found: &mut DiscoveredSources) -> CacheResult<RelocationReport> {
        let mut report = self.relocate_files(found).await?;

        let new_dir = self.artifact_dir(&self.new_root);
        let old_dir = self.artifact_dir(&self.old_root);

        fs::create_dir_all(&new_dir)
            .await
            .map_err(|e| CacheError::io(&new_dir, e))?;

        report.entries_moved = move_children(&old_dir, &new_dir).await?;
        report.dirs_pruned = prune_empty_dirs(&old_dir, &self.gen_root()).await?;

        info!(
            scanned = report.files_scanned,
            rewritten = report.files_rewritten,
            moved = report.entries_moved,
            pruned = report.dirs_pruned,
            sources = found.len(),
            "relocated cache"
        );
        Ok(report)
    }

    /// Depth-first walk of the cache root relocating each graph/build-info file.
    pub async fn relocate_files(
        &self,
        found: &mut DiscoveredSources,
    ) -> CacheResult<RelocationReport> {
        let mut report = RelocationReport::default();
        let mut stack = vec![self.cache_root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(CacheError::io(&dir, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| CacheError::io(&dir, e))?
            {
                let path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(t) => t,
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(CacheError::io(&path, e)),
                };

                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }

                let changed = match CacheFileKind::from_path(&path) {
                    Some(CacheFileKind::Graph) => {
                        relocate_file::<DependencyGraph>(&path, &self.roots, found).await?
                    }
                    Some(CacheFileKind::BuildInfo) => {
                        relocate_file::<BuildInfo>(&path, &self.roots, found).await?
                    }
                    None => continue,
                };

                report.files_scanned += 1;
                if changed {
                    report.files_rewritten += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Parse, relocate and (only if changed) write back one cache file.
pub async fn relocate_file<T: Relocate>(
    path: &Path,
    roots: &Roots,
    found: &mut DiscoveredSources,
) -> CacheResult<bool> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| CacheError::io(path, e))?;

    let mut doc: T = serde_json::from_str(&content).map_err(|e| CacheError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if !doc.relocate(roots, found) {
        return Ok(false);
    }

    let json = serde_json::to_string(&doc).map_err(|e| CacheError::Serialize {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_atomic(path, &json).await?;

    debug!(path = %path.display(), "relocated cache file");
    Ok(true)
}

async fn write_atomic(path: &Path, content: &str) -> CacheResult<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, content)
        .await
        .map_err(|e| CacheError::io(&temp_path, e))?;

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(CacheError::io(path, e));
    }

    Ok(())
}

/// Rename every direct child of `from` into `to`. A missing `from` moves nothing.
async fn move_children(from: &Path, to: &Path) -> CacheResult<usize> {
    let mut entries = match fs::read_dir(from).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(dir = %from.display(), "no artifacts to move");
            return Ok(0);
        }
        Err(e) => return Err(CacheError::io(from, e)),
    };

    let mut moved = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CacheError::io(from, e))?
    {
        let source = entry.path();
        // The new root may live below the old one.
        if to.starts_with(&source) {
            continue;
        }

        let target = to.join(entry.file_name());
        fs::rename(&source, &target)
            .await
            .map_err(|e| CacheError::io(&source, e))?;
        debug!(from = %source.display(), to = %target.display(), "moved cache entry");
        moved += 1;
    }

    Ok(moved)
}

/// Remove `start` if empty, then each ancestor that becomes empty.
///
/// Stops at the first non-empty directory and never removes `stop_at` or
/// anything above it. A directory that is already gone counts as removed
/// and the walk continues upward. Returns the number of directories removed.
pub async fn prune_empty_dirs(start: &Path, stop_at: &Path) -> CacheResult<usize> {
    let mut removed = 0;
    let mut current = start.to_path_buf();

    while current != stop_at && current.starts_with(stop_at) {
        match fs::read_dir(&current).await {
            Ok(mut entries) => {
                let has_entry = entries
                    .next_entry()
                    .await
                    .map_err(|e| CacheError::io(&current, e))?
                    .is_some();
                if has_entry {
                    break;
                }
                match fs::remove_dir(&current).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(CacheError::io(&current, e)),
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(&current, e)),
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    Ok(removed)
}
