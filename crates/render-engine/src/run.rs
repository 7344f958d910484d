//! Top-level render run: launch, wait, merge, clean up.

use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use scenemux_common::config::Retention;
use scenemux_common::error::{SceneMuxError, SceneMuxResult};
use scenemux_scene_model::{MediaLayout, SceneCatalog};

use crate::cleanup::{CleanupGuard, CleanupReport};
use crate::launcher::{launch_all, RenderInvocation};
use crate::merge::{merge_scenes, MergeBackend, MergeOutcome, MergeRequest};
use crate::registry::ProcessRegistry;
use crate::report::RunReport;
use crate::wait::wait_all;
use crate::workspace::prepare_workspace;

/// Where a run is, or where it ended.
///
/// ```text
/// Launching -> Waiting -> AllSucceeded -> Merging -> Done
///                     \-> AnyFailed -> Aborted      \-> MergeFailed
/// ```
///
/// `Interrupted` can follow any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Launching,
    Waiting,
    AllSucceeded,
    AnyFailed,
    Merging,
    Done,
    Aborted,
    MergeFailed,
    Interrupted,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::Aborted | Self::MergeFailed | Self::Interrupted
        )
    }

    /// Terminal phase for an error raised while in `self`.
    fn failed_from(self) -> Self {
        match self {
            Self::Merging => Self::MergeFailed,
            _ => Self::Aborted,
        }
    }
}

/// One complete render-and-merge job.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub invocation: RenderInvocation,
    pub catalog: SceneCatalog,

    /// Final merged video.
    pub output: PathBuf,

    pub retention: Retention,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub merge: MergeOutcome,
    pub cleanup: CleanupReport,
}

/// Run a job to completion.
///
/// Cleanup fires exactly once: explicitly before this returns, or from the
/// guard's `Drop` if the future is dropped mid-run.
pub async fn run_job(
    job: &RenderJob,
    backend: &dyn MergeBackend,
    report: &mut RunReport,
) -> SceneMuxResult<RunOutcome> {
    let layout = job.invocation.layout()?;
    let mut guard = CleanupGuard::new(job.retention);

    let result = execute(job, &layout, guard.registry_mut(), backend, report).await;
    let cleanup = guard.fire();

    match result {
        Ok(merge) => {
            report.finish(RunPhase::Done, None);
            tracing::info!(
                output = %merge.output.display(),
                method = ?merge.method,
                "Run complete"
            );
            Ok(RunOutcome { merge, cleanup })
        }
        Err(err) => {
            let phase = report.phase.failed_from();
            report.finish(phase, Some(err.to_string()));
            Err(err)
        }
    }
}

/// Run a job, abandoning it when `shutdown` resolves first.
///
/// `shutdown` yields the name of the signal that stopped the run. Dropping
/// the run future fires its cleanup guard, which asks every still-running
/// render to terminate.
pub async fn run_until_shutdown<F>(
    job: &RenderJob,
    backend: &dyn MergeBackend,
    report: &mut RunReport,
    shutdown: F,
) -> SceneMuxResult<RunOutcome>
where
    F: Future<Output = String>,
{
    let result = tokio::select! {
        result = run_job(job, backend, report) => result,
        signal = shutdown => Err(SceneMuxError::interrupted(signal)),
    };

    if let Err(err @ SceneMuxError::Interrupted { .. }) = &result {
        tracing::warn!(error = %err, "Run interrupted");
        report.finish(RunPhase::Interrupted, Some(err.to_string()));
    }
    result
}

async fn execute(
    job: &RenderJob,
    layout: &MediaLayout,
    registry: &mut ProcessRegistry,
    backend: &dyn MergeBackend,
    report: &mut RunReport,
) -> SceneMuxResult<MergeOutcome> {
    report.enter(RunPhase::Launching);
    prepare_workspace(layout, &job.output)?;

    let launched = launch_all(&job.invocation, &job.catalog, layout, registry);
    report.record_tasks(registry, layout);
    let count = launched?;
    tracing::info!(scenes = count, quality = %job.invocation.quality, "All scenes launched");

    report.enter(RunPhase::Waiting);
    let waited = wait_all(registry).await;
    report.record_tasks(registry, layout);
    if let Err(err) = waited {
        report.enter(RunPhase::AnyFailed);
        tracing::error!(
            failed = ?err.failed_scenes(),
            "Skipping merge because scenes failed"
        );
        return Err(err);
    }
    report.enter(RunPhase::AllSucceeded);

    report.enter(RunPhase::Merging);
    let request = MergeRequest {
        catalog: &job.catalog,
        layout,
        output: &job.output,
        frame_rate: job.invocation.frame_rate,
    };
    let outcome = merge_scenes(&request, registry, backend).await?;
    report.record_merge(&outcome);
    Ok(outcome)
}
