//! Render all scenes and merge them.

use std::path::PathBuf;

use clap::Args;

use scenemux_common::config::{AppConfig, Retention};
use scenemux_render_engine::{
    check_prerequisites, run_until_shutdown, FfmpegMerger, RenderInvocation, RenderJob,
    RunReport, TaskState,
};
use scenemux_scene_model::SceneCatalog;

use super::validate;

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Render tool executable
    pub executable: PathBuf,

    /// Script containing the scenes
    pub script: PathBuf,

    /// Media directory passed to the render tool
    pub media_dir: PathBuf,

    /// Merged output video
    pub output: PathBuf,

    /// Quality level: ql, qm, qh or qk
    pub quality: String,

    /// Frame-rate override passed to every scene
    pub frame_rate: Option<u32>,

    /// Keep the merge list and other temporary files
    #[arg(long)]
    pub keep_temp: bool,

    /// Comma-separated scene names, in merge order
    #[arg(long, value_name = "A,B,..")]
    pub scenes: Option<String>,

    /// ffmpeg binary used for merging
    #[arg(long, value_name = "BIN")]
    pub ffmpeg: Option<PathBuf>,

    /// Write a JSON run report
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Skip the render tool version check
    #[arg(long)]
    pub skip_version_check: bool,

    /// Let scenes write to the terminal instead of per-scene log files
    #[arg(long)]
    pub no_scene_logs: bool,
}

pub async fn run(args: RenderArgs, config: &AppConfig) -> anyhow::Result<()> {
    let quality = validate::quality(&args.quality)?;
    validate::frame_rate(args.frame_rate)?;
    validate::executable(&args.executable)?;
    validate::script(&args.script)?;
    validate::output(&args.output)?;

    let catalog = match &args.scenes {
        Some(list) => SceneCatalog::parse_list(list)?,
        None if !config.scenes.is_empty() => SceneCatalog::new(&config.scenes)?,
        None => SceneCatalog::builtin(),
    };

    let ffmpeg = args
        .ffmpeg
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.ffmpeg_binary));
    check_prerequisites(&args.executable, &ffmpeg, !args.skip_version_check).await?;

    let job = RenderJob {
        invocation: RenderInvocation {
            executable: args.executable,
            script: args.script,
            quality,
            media_dir: args.media_dir,
            frame_rate: args.frame_rate,
            scene_logs: config.scene_logs && !args.no_scene_logs,
        },
        catalog,
        output: args.output,
        retention: Retention::resolve(args.keep_temp),
    };

    tracing::info!(
        scenes = %job.catalog.names().join(","),
        quality = %quality,
        frame_rate = ?job.invocation.frame_rate,
        retention = ?job.retention,
        "Starting render"
    );

    let backend = FfmpegMerger::new(ffmpeg);
    let mut report = RunReport::new(quality);
    let result = run_until_shutdown(&job, &backend, &mut report, shutdown_signal()).await;

    if let Some(path) = &args.report {
        if let Err(e) = report.write_to(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to write run report");
        }
    }

    match result {
        Ok(outcome) => {
            println!(
                "Merged {} scenes into {} ({:?})",
                job.catalog.len(),
                outcome.merge.output.display(),
                outcome.merge.method
            );
            if !outcome.cleanup.retained_files.is_empty() {
                println!("Kept temporary files:");
                for path in &outcome.cleanup.retained_files {
                    println!("  {}", path.display());
                }
            }
            Ok(())
        }
        Err(err) => {
            if err.failed_scenes().is_some() {
                print_failed_scenes(&job, &report);
            }
            Err(err.into())
        }
    }
}

fn print_failed_scenes(job: &RenderJob, report: &RunReport) {
    let layout = job.invocation.layout().ok();
    eprintln!("The following scenes failed to render:");
    for entry in report.scenes.iter().filter(|s| s.state == TaskState::Failed) {
        let code = entry
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let log = job
            .catalog
            .get(&entry.name)
            .zip(layout.as_ref())
            .filter(|_| job.invocation.scene_logs)
            .map(|(scene, layout)| format!(", log: {}", layout.log_path(scene).display()))
            .unwrap_or_default();
        eprintln!("  - {} (exit {code}{log})", entry.name);
    }
}

/// Resolves with the name of the first termination signal received.
async fn shutdown_signal() -> String {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                "SIGTERM".to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<String>();

    tokio::select! {
        signal = ctrl_c => signal,
        signal = terminate => signal,
    }
}
