//! Run-scoped bookkeeping of render processes and temporary files.
//!
//! The registry is owned by one run and is only touched from the task that
//! drives it: the launcher adds tasks, the wait phase completes them, the
//! merge step adds temp files, and the cleanup guard drains both.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Child;

use scenemux_scene_model::Scene;

/// Lifecycle of one scene's render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Created, process not started yet.
    Pending,
    /// Process spawned and not yet observed to exit.
    Running,
    /// Process exited with status zero.
    Succeeded,
    /// Process exited non-zero, was killed by a signal, or could not be waited on.
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One scene's render process and its state.
#[derive(Debug)]
pub struct SceneTask {
    scene: Scene,
    state: TaskState,
    child: Option<Child>,
    pid: Option<u32>,
    exit_code: Option<i32>,
    started_at: Option<Instant>,
    elapsed: Option<Duration>,
    terminate_requested: bool,
}

impl SceneTask {
    pub fn pending(scene: Scene) -> Self {
        Self {
            scene,
            state: TaskState::Pending,
            child: None,
            pid: None,
            exit_code: None,
            started_at: None,
            elapsed: None,
            terminate_requested: false,
        }
    }

    /// Attach the spawned process. `Pending -> Running`.
    pub fn start(&mut self, child: Child) {
        debug_assert_eq!(self.state, TaskState::Pending);
        self.pid = child.id();
        self.child = Some(child);
        self.started_at = Some(Instant::now());
        self.state = TaskState::Running;
    }

    /// Block until the process exits and classify it.
    ///
    /// Only a `Running` task transitions; calling this again returns the
    /// state recorded the first time.
    pub async fn wait_for_exit(&mut self) -> TaskState {
        if self.state != TaskState::Running {
            return self.state;
        }
        let Some(child) = self.child.as_mut() else {
            return self.complete(false, None);
        };

        let waited = child.wait().await;
        match waited {
            Ok(status) => self.complete(status.success(), status.code()),
            Err(e) => {
                tracing::warn!(scene = %self.scene.name, error = %e, "Failed to wait on render process");
                self.complete(false, None)
            }
        }
    }

    fn complete(&mut self, succeeded: bool, exit_code: Option<i32>) -> TaskState {
        self.state = if succeeded {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        self.exit_code = exit_code;
        self.elapsed = self.started_at.map(|t| t.elapsed());
        self.child = None;
        self.state
    }

    /// Whether the process has already exited, without reaping state changes.
    pub(crate) fn has_exited(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(Some(_))),
            None => true,
        }
    }

    #[cfg(any(not(unix), test))]
    pub(crate) fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    pub(crate) fn mark_terminate_requested(&mut self) {
        self.terminate_requested = true;
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn terminate_requested(&self) -> bool {
        self.terminate_requested
    }
}

/// Handles and temp paths created during one run.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    tasks: Vec<SceneTask>,
    temp_files: BTreeSet<PathBuf>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_task(&mut self, task: SceneTask) {
        tracing::debug!(scene = %task.scene.name, pid = ?task.pid, "Registered render task");
        self.tasks.push(task);
    }

    pub fn register_temp_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::debug!(path = %path.display(), "Registered temp file");
        self.temp_files.insert(path);
    }

    pub(crate) fn forget_temp_file(&mut self, path: &Path) -> bool {
        self.temp_files.remove(path)
    }

    pub fn tasks(&self) -> &[SceneTask] {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut [SceneTask] {
        &mut self.tasks
    }

    pub fn temp_files(&self) -> &BTreeSet<PathBuf> {
        &self.temp_files
    }

    pub fn running_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Running)
            .count()
    }

    pub fn terminal_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.state.is_terminal()).count()
    }

    /// Names of failed scenes, in launch order.
    pub fn failed_scenes(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Failed)
            .map(|t| t.scene.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(name: &str, index: usize) -> Scene {
        Scene {
            name: name.to_string(),
            index,
        }
    }

    #[test]
    fn test_pending_task_defaults() {
        let task = SceneTask::pending(scene("Intro", 0));
        assert_eq!(task.state(), TaskState::Pending);
        assert!(task.pid().is_none());
        assert!(!task.terminate_requested());
    }

    #[test]
    fn test_temp_files_are_a_set() {
        let mut registry = ProcessRegistry::new();
        registry.register_temp_file("/tmp/a.txt");
        registry.register_temp_file("/tmp/a.txt");
        registry.register_temp_file("/tmp/b.txt");
        assert_eq!(registry.temp_files().len(), 2);
        assert!(registry.forget_temp_file(Path::new("/tmp/a.txt")));
        assert!(!registry.forget_temp_file(Path::new("/tmp/a.txt")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_transitions_exactly_once() {
        let child = tokio::process::Command::new("sh")
            .args(["-c", "exit 3"])
            .spawn()
            .unwrap();
        let mut task = SceneTask::pending(scene("Broken", 0));
        task.start(child);
        assert_eq!(task.state(), TaskState::Running);

        assert_eq!(task.wait_for_exit().await, TaskState::Failed);
        assert_eq!(task.exit_code(), Some(3));
        assert!(task.elapsed().is_some());

        // Second wait observes the recorded state.
        assert_eq!(task.wait_for_exit().await, TaskState::Failed);
    }
}
