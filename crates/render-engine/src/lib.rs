//! scenemux Render Engine
//!
//! Renders every scene of a catalog in parallel with an external render
//! tool, then joins the results into one video.
//!
//! # Pipeline Architecture
//!
//! ```text
//! SceneCatalog ──> launch_all ──> ProcessRegistry ──> wait_all
//!                  (one process      (tasks +            │
//!                   per scene)        temp files)        ├── any failed ──> Aborted
//!                                                        ▼
//!                                                  merge_scenes
//!                                                        │
//!                                          lossless concat (stream copy)
//!                                                        │ on failure
//!                                          transcode (libx264, CRF 18)
//!                                                        ▼
//!                                                   output.mp4
//! ```
//!
//! The whole run sits under one [`cleanup::CleanupGuard`], which owns the
//! registry and tears it down exactly once on every exit path.

pub mod cleanup;
pub mod launcher;
pub mod merge;
pub mod prereq;
pub mod registry;
pub mod report;
pub mod run;
pub mod wait;
pub mod workspace;

pub use cleanup::{CleanupGuard, CleanupReport};
pub use launcher::{launch_all, RenderInvocation};
pub use merge::{
    merge_scenes, FfmpegMerger, MergeBackend, MergeMethod, MergeOutcome, MergeRequest,
    TranscodeSettings,
};
pub use prereq::{check_prerequisites, ToolVersion};
pub use registry::{ProcessRegistry, SceneTask, TaskState};
pub use report::{RunReport, SceneReport};
pub use run::{run_job, run_until_shutdown, RenderJob, RunOutcome, RunPhase};
pub use wait::{wait_all, WaitSummary};
pub use workspace::{prepare_workspace, DirStatus};
