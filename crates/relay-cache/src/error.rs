//! Error types for cache relocation.

use std::path::{Path, PathBuf};

/// Cache relocation errors. Every variant aborts the build step.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Unexpected filesystem failure while reading, writing or moving cache entries.
    #[error("filesystem error at {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// A cache file could not be parsed as the format its extension claims.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A relocated document could not be serialized back.
    #[error("failed to serialize {}: {message}", path.display())]
    Serialize { path: PathBuf, message: String },

    /// Caller supplied roots that cannot be relocated.
    #[error("invalid root: {message}")]
    InvalidRoot { message: String },
}

impl CacheError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidRoot { .. } => 1,
            Self::Parse { .. } | Self::Serialize { .. } => 3,
            Self::Io { .. } => 4,
        }
    }
}

/// Result type for cache relocation.
pub type CacheResult<T> = Result<T, CacheError>;
