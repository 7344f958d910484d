//! Machine-readable summary of a run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scenemux_common::error::SceneMuxResult;
use scenemux_scene_model::{MediaLayout, QualityLevel};

use crate::merge::{MergeMethod, MergeOutcome};
use crate::registry::{ProcessRegistry, TaskState};
use crate::run::RunPhase;

/// Per-scene entry of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneReport {
    pub name: String,
    pub state: TaskState,
    pub exit_code: Option<i32>,
    pub duration_secs: Option<f64>,
    pub artifact: PathBuf,
}

/// Summary written with `--report`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub quality: QualityLevel,
    pub resolution_tag: String,
    pub phase: RunPhase,
    pub scenes: Vec<SceneReport>,
    pub merge_method: Option<MergeMethod>,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(quality: QualityLevel) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            quality,
            resolution_tag: quality.resolution_tag().to_string(),
            phase: RunPhase::Launching,
            scenes: Vec::new(),
            merge_method: None,
            output: None,
            error: None,
        }
    }

    /// Move to a new phase, logging the transition.
    pub fn enter(&mut self, phase: RunPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "Run phase");
        self.phase = phase;
    }

    /// Snapshot the state of every task.
    pub fn record_tasks(&mut self, registry: &ProcessRegistry, layout: &MediaLayout) {
        self.scenes = registry
            .tasks()
            .iter()
            .map(|task| SceneReport {
                name: task.scene().name.clone(),
                state: task.state(),
                exit_code: task.exit_code(),
                duration_secs: task.elapsed().map(|d| d.as_secs_f64()),
                artifact: layout.artifact_path(task.scene()),
            })
            .collect();
    }

    pub fn record_merge(&mut self, outcome: &MergeOutcome) {
        self.merge_method = Some(outcome.method);
        self.output = Some(outcome.output.clone());
    }

    /// Close the report with a terminal phase and optional error text.
    pub fn finish(&mut self, phase: RunPhase, error: Option<String>) {
        self.enter(phase);
        self.error = error;
        self.finished_at = Some(Utc::now());
    }

    pub fn failed_scenes(&self) -> Vec<&str> {
        self.scenes
            .iter()
            .filter(|s| s.state == TaskState::Failed)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn write_to(&self, path: &Path) -> SceneMuxResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(report = %path.display(), "Wrote run report");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_phase_and_scenes() {
        let mut report = RunReport::new(QualityLevel::High);
        report.scenes.push(SceneReport {
            name: "FindSolution".to_string(),
            state: TaskState::Failed,
            exit_code: Some(1),
            duration_secs: Some(2.5),
            artifact: PathBuf::from("media/videos/lesson/1080p60/FindSolution.mp4"),
        });
        report.finish(RunPhase::Aborted, Some("Scene render failed: FindSolution".to_string()));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["phase"], "aborted");
        assert_eq!(json["quality"], "high");
        assert_eq!(json["resolution_tag"], "1080p60");
        assert_eq!(json["scenes"][0]["state"], "failed");
        assert_eq!(report.failed_scenes(), vec!["FindSolution"]);
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn test_write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");
        RunReport::new(QualityLevel::Low).write_to(&path).unwrap();
        let back: RunReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.resolution_tag, "480p15");
    }
}
