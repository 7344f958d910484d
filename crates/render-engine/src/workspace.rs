//! Directory preparation before any render starts.
//!
//! Several render processes starting at once would otherwise race to create
//! the same output subdirectories.

use std::path::{Path, PathBuf};

use scenemux_common::error::SceneMuxResult;
use scenemux_scene_model::MediaLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStatus {
    Created,
    AlreadyPresent,
}

/// Create `path` if missing and report which case applied.
pub fn ensure_dir(path: &Path) -> SceneMuxResult<DirStatus> {
    if path.is_dir() {
        tracing::info!(path = %path.display(), "Directory already present");
        return Ok(DirStatus::AlreadyPresent);
    }
    std::fs::create_dir_all(path)?;
    tracing::info!(path = %path.display(), "Created directory");
    Ok(DirStatus::Created)
}

/// Create the media directory tree and the output's parent directory.
pub fn prepare_workspace(
    layout: &MediaLayout,
    output: &Path,
) -> SceneMuxResult<Vec<(PathBuf, DirStatus)>> {
    let mut dirs = layout.directories();
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        dirs.push(parent.to_path_buf());
    }

    let mut statuses = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let status = ensure_dir(&dir)?;
        statuses.push((dir, status));
    }
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenemux_scene_model::QualityLevel;

    #[test]
    fn test_creates_missing_tree() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        let layout = MediaLayout::new(&media, Path::new("lesson.py"), QualityLevel::High).unwrap();

        let statuses = prepare_workspace(&layout, &dir.path().join("out").join("final.mp4")).unwrap();
        assert_eq!(statuses[0], (media.clone(), DirStatus::Created));
        assert!(layout.artifact_dir().is_dir());
        assert!(dir.path().join("out").is_dir());
    }

    #[test]
    fn test_existing_media_dir_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        std::fs::create_dir_all(&media).unwrap();
        let marker = media.join("keep.txt");
        std::fs::write(&marker, b"x").unwrap();

        let layout = MediaLayout::new(&media, Path::new("lesson.py"), QualityLevel::Low).unwrap();
        let statuses = prepare_workspace(&layout, Path::new("final.mp4")).unwrap();

        assert_eq!(statuses[0].1, DirStatus::AlreadyPresent);
        assert_eq!(statuses.len(), layout.directories().len());
        assert!(marker.exists());
    }
}
