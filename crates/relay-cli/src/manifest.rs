//! Function manifests handed to the deployment step.
//!
//! ```text
//! <out_dir>/<entrypoint>.func.json
//! ```

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cli::args::ManifestOptions;

/// Manifest for one relocated entrypoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionManifest {
    /// Handler path relative to the task root.
    pub handler: String,

    /// Runtime identifier.
    pub runtime: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<u32>,

    #[serde(default)]
    pub regions: Vec<String>,
}

impl FunctionManifest {
    pub fn for_entrypoint(entrypoint: &str, options: &ManifestOptions) -> Self {
        Self {
            handler: entrypoint.to_string(),
            runtime: options.runtime.clone(),
            memory: options.memory,
            max_duration: options.max_duration,
            regions: options.regions.clone(),
        }
    }
}

/// Path of the manifest for `entrypoint`, rejecting paths that escape `out_dir`.
pub fn manifest_path(out_dir: &Path, entrypoint: &str) -> Result<PathBuf> {
    let relative = Path::new(entrypoint);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        bail!("entrypoint must be a relative path inside the project: {}", entrypoint);
    }
    Ok(out_dir.join(format!("{}.func.json", entrypoint)))
}

/// Write one manifest per entrypoint. Returns the written paths.
pub async fn write_manifests(options: &ManifestOptions) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(options.entrypoints.len());

    for entrypoint in &options.entrypoints {
        let path = manifest_path(&options.out_dir, entrypoint)?;
        let manifest = FunctionManifest::for_entrypoint(entrypoint, options);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;

        info!(entrypoint = %entrypoint, path = %path.display(), "wrote function manifest");
        written.push(path);
    }

    Ok(written)
}
