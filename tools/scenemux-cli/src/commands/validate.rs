//! Argument checks done before anything is launched.

use std::path::Path;

use scenemux_common::error::{SceneMuxError, SceneMuxResult};
use scenemux_scene_model::QualityLevel;

pub fn quality(code: &str) -> SceneMuxResult<QualityLevel> {
    code.parse()
}

pub fn frame_rate(frame_rate: Option<u32>) -> SceneMuxResult<()> {
    match frame_rate {
        Some(0) => Err(SceneMuxError::validation(
            "Frame rate must be a positive integer",
        )),
        _ => Ok(()),
    }
}

/// The render tool must be an existing, executable file.
pub fn executable(path: &Path) -> SceneMuxResult<()> {
    let metadata = std::fs::metadata(path).map_err(|_| {
        SceneMuxError::validation(format!("Executable not found: {}", path.display()))
    })?;
    if !metadata.is_file() {
        return Err(SceneMuxError::validation(format!(
            "Executable is not a file: {}",
            path.display()
        )));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(SceneMuxError::validation(format!(
                "File is not executable: {}",
                path.display()
            )));
        }
    }

    Ok(())
}

pub fn script(path: &Path) -> SceneMuxResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(SceneMuxError::validation(format!(
            "Script not found: {}",
            path.display()
        )))
    }
}

pub fn output(path: &Path) -> SceneMuxResult<()> {
    if path.file_name().is_none() || path.is_dir() {
        return Err(SceneMuxError::validation(format!(
            "Output must be a file path: {}",
            path.display()
        )));
    }
    Ok(())
}
