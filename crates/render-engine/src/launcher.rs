//! Launching one render process per scene.

use std::ffi::OsString;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use scenemux_common::error::{SceneMuxError, SceneMuxResult};
use scenemux_scene_model::{MediaLayout, QualityLevel, Scene, SceneCatalog};

use crate::registry::{ProcessRegistry, SceneTask};

/// Flag the render tool takes for its media directory.
pub const MEDIA_DIR_FLAG: &str = "--media_dir";

/// Flag the render tool takes for an explicit frame rate.
pub const FRAME_RATE_FLAG: &str = "--frame_rate";

/// Fixed parts of every render command.
#[derive(Debug, Clone)]
pub struct RenderInvocation {
    /// Render tool executable.
    pub executable: PathBuf,

    /// Script containing the scenes.
    pub script: PathBuf,

    /// Quality level for every scene.
    pub quality: QualityLevel,

    /// Media/working directory handed to the render tool.
    pub media_dir: PathBuf,

    /// Optional frame-rate override.
    pub frame_rate: Option<u32>,

    /// Send each scene's stdout/stderr to its own log file instead of
    /// inheriting the terminal.
    pub scene_logs: bool,
}

impl RenderInvocation {
    /// Artifact layout implied by this invocation.
    pub fn layout(&self) -> SceneMuxResult<MediaLayout> {
        MediaLayout::new(&self.media_dir, &self.script, self.quality)
    }

    /// Arguments for one scene:
    /// `<script> <Scene> <quality-flag> --media_dir <dir> [--frame_rate <n>]`.
    pub fn args_for(&self, scene: &Scene) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            self.script.clone().into(),
            scene.name.clone().into(),
            self.quality.flag().into(),
            MEDIA_DIR_FLAG.into(),
            self.media_dir.clone().into(),
        ];
        if let Some(fps) = self.frame_rate {
            args.push(FRAME_RATE_FLAG.into());
            args.push(fps.to_string().into());
        }
        args
    }

    fn command_for(&self, scene: &Scene, layout: &MediaLayout) -> SceneMuxResult<Command> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(self.args_for(scene)).stdin(Stdio::null());

        if self.scene_logs {
            let log_path = layout.log_path(scene);
            let log = File::create(&log_path).map_err(|e| {
                SceneMuxError::spawn(
                    &scene.name,
                    format!("cannot create log file {}: {e}", log_path.display()),
                )
            })?;
            let log_err = log
                .try_clone()
                .map_err(|e| SceneMuxError::spawn(&scene.name, e))?;
            cmd.stdout(Stdio::from(log)).stderr(Stdio::from(log_err));
        }

        Ok(cmd)
    }
}

/// Spawn every scene in catalog order without waiting for any of them.
///
/// Each spawned process is registered before the next one is started. The
/// first spawn failure stops the launch and is returned; processes already
/// registered are left for the cleanup guard.
pub fn launch_all(
    invocation: &RenderInvocation,
    catalog: &SceneCatalog,
    layout: &MediaLayout,
    registry: &mut ProcessRegistry,
) -> SceneMuxResult<usize> {
    for scene in catalog {
        let mut cmd = invocation.command_for(scene, layout)?;
        let mut task = SceneTask::pending(scene.clone());

        let child = cmd
            .spawn()
            .map_err(|e| SceneMuxError::spawn(&scene.name, e))?;

        task.start(child);
        tracing::info!(
            scene = %scene.name,
            index = scene.index,
            pid = ?task.pid(),
            "Render process started"
        );
        registry.register_task(task);
    }

    Ok(registry.tasks().len())
}
