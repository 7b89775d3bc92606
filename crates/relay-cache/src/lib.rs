//! Incremental compiler cache relocation.
//!
//! Cache files produced by a build rooted at one absolute path embed that
//! path in `file://` references. This crate rewrites those references so the
//! cache stays valid when executed from a different root, and moves the
//! cached artifacts to match:
//!
//! - [`DependencyGraph`] (`*.graph`): resolved dependency URIs
//! - [`BuildInfo`] (`*.buildinfo`): compiler incremental state
//! - [`CacheFileMover`]: walks a cache directory, relocates every file,
//!   moves artifact directories and prunes what is left empty
//!
//! # Quick Start
//!
//! ```no_run
//! use relay_cache::{CacheFileMover, DiscoveredSources};
//!
//! # async fn example() -> relay_cache::CacheResult<()> {
//! let mover = CacheFileMover::new("/tmp/deno_dir", "/vercel/path0", "/var/task")?;
//! let mut sources = DiscoveredSources::new();
//! let report = mover.run(&mut sources).await?;
//! println!("rewrote {} cache files", report.files_rewritten);
//! # Ok(())
//! # }
//! ```

pub mod buildinfo;
pub mod discovered;
pub mod error;
pub mod graph;
pub mod mover;
pub mod uri;

pub use buildinfo::{BuildInfo, FileInfo, Program};
pub use discovered::DiscoveredSources;
pub use error::{CacheError, CacheResult};
pub use graph::DependencyGraph;
pub use mover::{prune_empty_dirs, relocate_file, CacheFileKind, CacheFileMover, RelocationReport};
pub use uri::{file_uri, relocate_uri, Roots};

/// A cache document whose embedded root references can be rewritten.
///
/// Implementations must only rewrite string contents or re-key map
/// entries: sequence lengths and element order are preserved.
pub trait Relocate: serde::Serialize + serde::de::DeserializeOwned {
    /// Rewrite references under `roots.from` to `roots.to`, recording each
    /// relative path in `found`. Returns whether anything changed.
    fn relocate(&mut self, roots: &Roots, found: &mut DiscoveredSources) -> bool;
}
