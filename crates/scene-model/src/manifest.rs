//! Merge manifest: the ordered list of scene artifacts to concatenate.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use scenemux_common::error::{SceneMuxError, SceneMuxResult};

use crate::layout::MediaLayout;
use crate::scene::{Scene, SceneCatalog};

/// One scene's artifact in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub scene: Scene,

    /// Absolute path of the rendered artifact.
    pub path: PathBuf,
}

/// Exactly one entry per catalog scene, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeManifest {
    entries: Vec<ManifestEntry>,
}

impl MergeManifest {
    /// Build the manifest for a catalog. Relative media dirs are resolved
    /// against the current directory so the list file works from anywhere.
    pub fn build(catalog: &SceneCatalog, layout: &MediaLayout) -> SceneMuxResult<Self> {
        let base = std::env::current_dir()?;
        Ok(Self::build_with_base(catalog, layout, &base))
    }

    pub fn build_with_base(catalog: &SceneCatalog, layout: &MediaLayout, base: &Path) -> Self {
        let entries = catalog
            .iter()
            .map(|scene| {
                let path = layout.artifact_path(scene);
                let path = if path.is_absolute() {
                    path
                } else {
                    base.join(path)
                };
                ManifestEntry {
                    scene: scene.clone(),
                    path,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail with `MissingArtifact` for the first entry (in catalog order)
    /// whose file is absent.
    pub fn verify_artifacts(&self) -> SceneMuxResult<()> {
        match self.entries.iter().find(|e| !e.path.is_file()) {
            Some(missing) => Err(SceneMuxError::MissingArtifact {
                scene: missing.scene.name.clone(),
                path: missing.path.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Render the list in ffmpeg concat demuxer format, one
    /// `file '<absolute-path>'` line per scene.
    pub fn to_concat_list(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str("file '");
            out.push_str(&escape_concat_path(&entry.path));
            out.push_str("'\n");
        }
        out
    }
}

/// Single quotes close the quoted string, so they are written as `'\''`.
fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}
