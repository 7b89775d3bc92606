//! Compiler build-info (`*.buildinfo`) relocation.
//!
//! The build-info record links file identities across several collections:
//!
//! - `fileInfos`: per-file metadata keyed by URI (key-only)
//! - `referencedMap` / `exportedModulesMap`: URI -> ordered URI list (key+list)
//! - `fileNames` / `semanticDiagnosticsPerFile`: flat ordered lists
//!
//! Positions in the lists are referenced by parts of the compiler cache that
//! are not modeled here, so relocation only rewrites strings or re-keys map
//! entries. It never inserts, removes or reorders list elements.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::discovered::DiscoveredSources;
use crate::uri::{relocate_uri, Roots};
use crate::Relocate;

/// Incremental compilation state written by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub program: Program,

    pub version: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-program file tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_names: Option<Vec<String>>,

    pub file_infos: BTreeMap<String, FileInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_map: Option<BTreeMap<String, Vec<String>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_modules_map: Option<BTreeMap<String, Vec<String>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_diagnostics_per_file: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Metadata the compiler keeps for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affects_global_scope: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Relocate for BuildInfo {
    fn relocate(&mut self, roots: &Roots, found: &mut DiscoveredSources) -> bool {
        let program = &mut self.program;
        let mut changed = false;

        changed |= rekey(&mut program.file_infos, roots, found);

        for map in [&mut program.referenced_map, &mut program.exported_modules_map]
            .into_iter()
            .flatten()
        {
            changed |= relocate_reference_map(map, roots, found);
        }

        for list in [
            &mut program.file_names,
            &mut program.semantic_diagnostics_per_file,
        ]
        .into_iter()
        .flatten()
        {
            changed |= roots.rewrite_all(list, found);
        }

        changed
    }
}

/// Rewrite list entries first, then the keys. Both can apply to one entry.
fn relocate_reference_map(
    map: &mut BTreeMap<String, Vec<String>>,
    roots: &Roots,
    found: &mut DiscoveredSources,
) -> bool {
    let mut changed = false;
    for refs in map.values_mut() {
        changed |= roots.rewrite_all(refs, found);
    }
    changed | rekey(map, roots, found)
}

/// Move every entry whose key is under the old root to the rewritten key.
/// The old key is always removed so a file is never present under both.
///
/// All matching entries are taken out before any is reinserted: with the new
/// root nested in the old one, a rewritten key can equal a key still waiting
/// to move.
fn rekey<V>(map: &mut BTreeMap<String, V>, roots: &Roots, found: &mut DiscoveredSources) -> bool {
    let moves: Vec<(String, String)> = map
        .keys()
        .filter_map(|key| {
            relocate_uri(key, &roots.from, &roots.to).map(|(rewritten, suffix)| {
                found.insert(suffix);
                (key.clone(), rewritten)
            })
        })
        .collect();

    let moved: Vec<(String, V)> = moves
        .into_iter()
        .filter_map(|(old, new)| map.remove(&old).map(|value| (new, value)))
        .collect();

    let changed = !moved.is_empty();
    map.extend(moved);
    changed
}
