//! Error types shared across scenemux crates.

use std::path::PathBuf;

/// Top-level error type for scenemux operations.
///
/// Variants follow the lifecycle of a run: input validation and
/// prerequisite checks fail before anything is launched, spawn and render
/// failures happen while scenes run, and the remaining variants belong to
/// the merge step.
#[derive(Debug, thiserror::Error)]
pub enum SceneMuxError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Missing prerequisite: {message}")]
    Prerequisite { message: String },

    #[error("Failed to launch scene {scene}: {reason}")]
    Spawn { scene: String, reason: String },

    #[error("Scene render failed: {}", .scenes.join(", "))]
    FailedScenes { scenes: Vec<String> },

    #[error("Missing artifact for scene {scene}: {}", .path.display())]
    MissingArtifact { scene: String, path: PathBuf },

    #[error("Merge failed (lossless: {lossless}; transcode: {transcode})")]
    MergeFailure { lossless: String, transcode: String },

    #[error("Interrupted by {signal}")]
    Interrupted { signal: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SceneMuxError.
pub type SceneMuxResult<T> = Result<T, SceneMuxError>;

impl SceneMuxError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    pub fn prerequisite(msg: impl Into<String>) -> Self {
        Self::Prerequisite {
            message: msg.into(),
        }
    }

    pub fn spawn(scene: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Spawn {
            scene: scene.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn interrupted(signal: impl Into<String>) -> Self {
        Self::Interrupted {
            signal: signal.into(),
        }
    }

    /// Process exit code for this error. Every fatal class maps to 1.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// Names of the failed scenes, if this is an aggregated render failure.
    pub fn failed_scenes(&self) -> Option<&[String]> {
        match self {
            Self::FailedScenes { scenes } => Some(scenes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_scenes_message_lists_every_scene() {
        let err = SceneMuxError::FailedScenes {
            scenes: vec!["FindSolution".to_string(), "Conclusion".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Scene render failed: FindSolution, Conclusion"
        );
        assert_eq!(err.failed_scenes().map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_merge_failure_names_both_attempts() {
        let err = SceneMuxError::MergeFailure {
            lossless: "stream mismatch".to_string(),
            transcode: "encoder missing".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("stream mismatch"));
        assert!(msg.contains("encoder missing"));
        assert_eq!(err.exit_code(), 1);
    }
}
