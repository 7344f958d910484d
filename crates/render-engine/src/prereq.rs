//! External tool checks run before anything is launched.

use std::fmt;
use std::path::Path;
use std::process::Stdio;

use scenemux_common::error::{SceneMuxError, SceneMuxResult};

/// Render tool versions at or below this are rejected.
pub const RENDER_TOOL_VERSION_FLOOR: ToolVersion = ToolVersion { major: 0, minor: 15 };

/// `major.minor` of an external tool. Patch components are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ToolVersion {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Find the first `major.minor` token in `--version` output.
///
/// Accepts forms like `Manim Community v0.18.1` or `0.19`.
pub fn parse_version(text: &str) -> Option<ToolVersion> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .map(|token| token.trim_start_matches(['v', 'V']))
        .find_map(|token| {
            let mut parts = token.split('.');
            let major = parts.next()?.parse().ok()?;
            let minor = parts.next()?.parse().ok()?;
            Some(ToolVersion { major, minor })
        })
}

/// Whether a version is new enough.
pub fn version_is_supported(version: ToolVersion) -> bool {
    version > RENDER_TOOL_VERSION_FLOOR
}

/// Whether `binary` resolves to an executable, as a path or through `PATH`.
pub fn command_exists(binary: &Path) -> bool {
    which::which(binary).is_ok()
}

/// Run `<executable> --version` and require a supported version.
pub async fn check_render_tool_version(executable: &Path) -> SceneMuxResult<ToolVersion> {
    let output = tokio::process::Command::new(executable)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| {
            SceneMuxError::prerequisite(format!(
                "cannot run {} --version: {e}",
                executable.display()
            ))
        })?;

    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let version = parse_version(&text).ok_or_else(|| {
        SceneMuxError::prerequisite(format!(
            "could not read a version from {} --version",
            executable.display()
        ))
    })?;

    if !version_is_supported(version) {
        return Err(SceneMuxError::prerequisite(format!(
            "{} version {version} is too old (need newer than {RENDER_TOOL_VERSION_FLOOR})",
            executable.display()
        )));
    }

    tracing::info!(%version, executable = %executable.display(), "Render tool version ok");
    Ok(version)
}

/// Check that ffmpeg is available and, unless skipped, the render tool version.
pub async fn check_prerequisites(
    render_executable: &Path,
    ffmpeg: &Path,
    check_version: bool,
) -> SceneMuxResult<()> {
    if !command_exists(ffmpeg) {
        return Err(SceneMuxError::prerequisite(format!(
            "{} not found (install ffmpeg or pass --ffmpeg)",
            ffmpeg.display()
        )));
    }

    if check_version {
        check_render_tool_version(render_executable).await?;
    } else {
        tracing::debug!("Skipping render tool version check");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_forms() {
        assert_eq!(
            parse_version("Manim Community v0.18.1"),
            Some(ToolVersion { major: 0, minor: 18 })
        );
        assert_eq!(parse_version("0.19\n"), Some(ToolVersion { major: 0, minor: 19 }));
        assert_eq!(parse_version("tool 1.2, build 7"), Some(ToolVersion { major: 1, minor: 2 }));
        assert_eq!(parse_version("no digits here"), None);
        assert_eq!(parse_version("v7"), None);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        assert!(!version_is_supported(ToolVersion { major: 0, minor: 15 }));
        assert!(!version_is_supported(ToolVersion { major: 0, minor: 9 }));
        assert!(version_is_supported(ToolVersion { major: 0, minor: 16 }));
        assert!(version_is_supported(ToolVersion { major: 1, minor: 0 }));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exists() {
        assert!(command_exists(Path::new("sh")));
        assert!(!command_exists(Path::new("scenemux-definitely-missing-tool")));
        assert!(!command_exists(Path::new("/nonexistent/ffmpeg")));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exists_treats_name_literally() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("created");
        let hostile = format!("sh;touch {}", marker.display());

        assert!(!command_exists(Path::new(&hostile)));
        assert!(!command_exists(Path::new("sh -c true")));
        assert!(!command_exists(Path::new("$(touch x)")));
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unresolvable_ffmpeg_is_prerequisite_error() {
        let err = check_prerequisites(Path::new("sh"), Path::new("sh;true"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SceneMuxError::Prerequisite { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_check_runs_tool() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let write_tool = |name: &str, version: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, format!("#!/bin/sh\necho 'Manim Community v{version}'\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };

        let new = write_tool("new-tool", "0.18.1");
        assert_eq!(
            check_render_tool_version(&new).await.unwrap(),
            ToolVersion { major: 0, minor: 18 }
        );

        let old = write_tool("old-tool", "0.15.2");
        let err = check_render_tool_version(&old).await.unwrap_err();
        assert!(matches!(err, SceneMuxError::Prerequisite { .. }));
    }
}
