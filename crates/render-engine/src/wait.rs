//! Waiting on every render and aggregating failures.

use scenemux_common::error::{SceneMuxError, SceneMuxResult};

use crate::registry::{ProcessRegistry, TaskState};

/// Outcome of a wait phase in which every scene succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSummary {
    /// Scenes observed to finish successfully, in launch order.
    pub succeeded: Vec<String>,
}

/// Wait for each registered render in launch order.
///
/// A failed scene never cuts the wait short: siblings keep running and are
/// each classified when they exit, so the error lists every failed scene.
pub async fn wait_all(registry: &mut ProcessRegistry) -> SceneMuxResult<WaitSummary> {
    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for task in registry.tasks_mut() {
        let state = task.wait_for_exit().await;
        let name = task.scene().name.clone();
        match state {
            TaskState::Succeeded => {
                tracing::info!(
                    scene = %name,
                    elapsed_secs = task.elapsed().map(|d| d.as_secs_f64()),
                    "Scene rendered"
                );
                succeeded.push(name);
            }
            TaskState::Failed => {
                tracing::error!(scene = %name, exit_code = ?task.exit_code(), "Scene render failed");
                failed.push(name);
            }
            TaskState::Pending | TaskState::Running => {
                // Never spawned; cannot have produced an artifact.
                tracing::error!(scene = %name, ?state, "Scene was not running");
                failed.push(name);
            }
        }
    }

    if failed.is_empty() {
        Ok(WaitSummary { succeeded })
    } else {
        Err(SceneMuxError::FailedScenes { scenes: failed })
    }
}
