//! Where the render tool puts its output.
//!
//! A scene rendered from `scripts/lesson.py` at quality `qh` with media
//! directory `media` lands at:
//!
//! ```text
//! media/videos/lesson/1080p60/<Scene>.mp4
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use scenemux_common::error::{SceneMuxError, SceneMuxResult};

use crate::quality::QualityLevel;
use crate::scene::Scene;

/// Subdirectory of the media dir holding rendered videos.
pub const VIDEOS_SUBDIR: &str = "videos";

/// Subdirectory of the media dir holding per-scene render logs.
pub const LOGS_SUBDIR: &str = "logs";

/// Container extension produced by the render tool.
pub const MEDIA_EXTENSION: &str = "mp4";

/// Deterministic artifact path convention for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLayout {
    /// Working/media directory handed to the render tool.
    pub media_dir: PathBuf,

    /// Base name of the render script, without extension.
    pub script_stem: String,

    /// Resolution tag of the run's quality level.
    pub resolution_tag: String,
}

impl MediaLayout {
    pub fn new(media_dir: impl Into<PathBuf>, script: &Path, quality: QualityLevel) -> SceneMuxResult<Self> {
        let script_stem = script
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SceneMuxError::validation(format!(
                    "Script path has no file name: {}",
                    script.display()
                ))
            })?;

        Ok(Self {
            media_dir: media_dir.into(),
            script_stem,
            resolution_tag: quality.resolution_tag().to_string(),
        })
    }

    /// Directory all scene artifacts of this run are written to.
    pub fn artifact_dir(&self) -> PathBuf {
        self.media_dir
            .join(VIDEOS_SUBDIR)
            .join(&self.script_stem)
            .join(&self.resolution_tag)
    }

    /// Expected output path for a scene.
    pub fn artifact_path(&self, scene: &Scene) -> PathBuf {
        self.artifact_dir()
            .join(format!("{}.{}", scene.name, MEDIA_EXTENSION))
    }

    /// Per-scene log file.
    pub fn log_path(&self, scene: &Scene) -> PathBuf {
        self.media_dir
            .join(LOGS_SUBDIR)
            .join(format!("{}.log", scene.name))
    }

    /// Directories to create before any render process starts, parents first.
    pub fn directories(&self) -> Vec<PathBuf> {
        let videos = self.media_dir.join(VIDEOS_SUBDIR);
        let script_dir = videos.join(&self.script_stem);
        vec![
            self.media_dir.clone(),
            videos,
            script_dir,
            self.artifact_dir(),
            self.media_dir.join(LOGS_SUBDIR),
        ]
    }
}
