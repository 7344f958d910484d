//! Merging scene artifacts into the final video.
//!
//! A lossless concat (stream copy) is always tried first. Only if it fails
//! is the slower re-encoding merge attempted, with fixed settings:
//!
//! | setting      | value     |
//! |--------------|-----------|
//! | video codec  | `libx264` |
//! | CRF          | `18`      |
//! | preset       | `medium`  |
//! | pixel format | `yuv420p` |
//! | audio codec  | `aac`     |
//!
//! Both attempts write to a hidden staging file next to the output, which is
//! renamed onto the output only after ffmpeg succeeds.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use scenemux_common::error::{SceneMuxError, SceneMuxResult};
use scenemux_scene_model::{MediaLayout, MergeManifest, SceneCatalog};

use crate::registry::ProcessRegistry;

pub const TRANSCODE_VIDEO_CODEC: &str = "libx264";
pub const TRANSCODE_CRF: u8 = 18;
pub const TRANSCODE_PRESET: &str = "medium";
pub const TRANSCODE_PIXEL_FORMAT: &str = "yuv420p";
pub const TRANSCODE_AUDIO_CODEC: &str = "aac";

/// Lines of ffmpeg stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 12;

/// Re-encoding parameters for the fallback merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeSettings {
    pub video_codec: String,
    pub crf: u8,
    pub preset: String,
    pub pixel_format: String,
    pub audio_codec: String,

    /// Explicit output frame rate, only when one was requested for the run.
    pub frame_rate: Option<u32>,
}

impl TranscodeSettings {
    pub fn fixed(frame_rate: Option<u32>) -> Self {
        Self {
            video_codec: TRANSCODE_VIDEO_CODEC.to_string(),
            crf: TRANSCODE_CRF,
            preset: TRANSCODE_PRESET.to_string(),
            pixel_format: TRANSCODE_PIXEL_FORMAT.to_string(),
            audio_codec: TRANSCODE_AUDIO_CODEC.to_string(),
            frame_rate,
        }
    }
}

/// Which merge produced the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Lossless,
    Transcode,
}

/// Successful merge result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub method: MergeMethod,
    pub output: PathBuf,

    /// Why the lossless attempt failed, when the transcode was used.
    pub lossless_error: Option<String>,
}

/// Tool that joins a concat list into one file.
#[async_trait]
pub trait MergeBackend: Send + Sync {
    /// Join without re-encoding.
    async fn concat_copy(&self, list_file: &Path, output: &Path) -> SceneMuxResult<()>;

    /// Join with re-encoding.
    async fn transcode(
        &self,
        list_file: &Path,
        output: &Path,
        settings: &TranscodeSettings,
    ) -> SceneMuxResult<()>;

    /// Backend name.
    fn name(&self) -> &str;
}

/// ffmpeg concat demuxer backend.
#[derive(Debug, Clone)]
pub struct FfmpegMerger {
    binary: PathBuf,
}

impl Default for FfmpegMerger {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegMerger {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn input_args(list_file: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
        args.push(list_file.into());
        args
    }

    pub fn lossless_args(list_file: &Path, output: &Path) -> Vec<OsString> {
        let mut args = Self::input_args(list_file);
        args.extend(["-c", "copy"].map(OsString::from));
        args.push(output.into());
        args
    }

    pub fn transcode_args(list_file: &Path, output: &Path, settings: &TranscodeSettings) -> Vec<OsString> {
        let mut args = Self::input_args(list_file);
        let mut push = |a: &str| args.push(OsString::from(a));
        push("-c:v");
        push(&settings.video_codec);
        push("-crf");
        push(&settings.crf.to_string());
        push("-preset");
        push(&settings.preset);
        push("-pix_fmt");
        push(&settings.pixel_format);
        if let Some(fps) = settings.frame_rate {
            push("-r");
            push(&fps.to_string());
        }
        push("-c:a");
        push(&settings.audio_codec);
        push("-movflags");
        push("+faststart");
        args.push(output.into());
        args
    }

    async fn run_ffmpeg(&self, args: Vec<OsString>) -> SceneMuxResult<()> {
        tracing::debug!(binary = %self.binary.display(), ?args, "Running ffmpeg");
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start {}: {e}", self.binary.display()))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(anyhow::anyhow!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr_tail(&stderr, STDERR_TAIL_LINES)
        )
        .into())
    }
}

#[async_trait]
impl MergeBackend for FfmpegMerger {
    async fn concat_copy(&self, list_file: &Path, output: &Path) -> SceneMuxResult<()> {
        self.run_ffmpeg(Self::lossless_args(list_file, output)).await
    }

    async fn transcode(
        &self,
        list_file: &Path,
        output: &Path,
        settings: &TranscodeSettings,
    ) -> SceneMuxResult<()> {
        self.run_ffmpeg(Self::transcode_args(list_file, output, settings))
            .await
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn stderr_tail(stderr: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join(" | ")
}

/// Everything the merge step needs to know about a run.
#[derive(Debug, Clone)]
pub struct MergeRequest<'a> {
    pub catalog: &'a SceneCatalog,
    pub layout: &'a MediaLayout,
    pub output: &'a Path,
    pub frame_rate: Option<u32>,
}

/// Sibling paths used while merging into `output`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePaths {
    /// Concat demuxer list file.
    pub list_file: PathBuf,

    /// File ffmpeg writes to before it is renamed onto the output.
    pub staging: PathBuf,
}

impl MergePaths {
    pub fn for_output(output: &Path) -> SceneMuxResult<Self> {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SceneMuxError::validation(format!(
                    "Output path has no file name: {}",
                    output.display()
                ))
            })?;
        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        // Keep the extension so ffmpeg picks the same muxer as for the output.
        let staging_name = match output.extension() {
            Some(ext) => format!(".{stem}.partial.{}", ext.to_string_lossy()),
            None => format!(".{stem}.partial"),
        };

        Ok(Self {
            list_file: dir.join(format!(".{stem}.concat.txt")),
            staging: dir.join(staging_name),
        })
    }
}

/// Verify every artifact, write the concat list, and merge.
pub async fn merge_scenes(
    request: &MergeRequest<'_>,
    registry: &mut ProcessRegistry,
    backend: &dyn MergeBackend,
) -> SceneMuxResult<MergeOutcome> {
    let manifest = MergeManifest::build(request.catalog, request.layout)?;
    manifest.verify_artifacts()?;

    let paths = MergePaths::for_output(request.output)?;
    registry.register_temp_file(&paths.list_file);
    std::fs::write(&paths.list_file, manifest.to_concat_list())?;
    registry.register_temp_file(&paths.staging);

    tracing::info!(
        scenes = manifest.len(),
        list = %paths.list_file.display(),
        backend = backend.name(),
        "Merging scenes (lossless)"
    );

    remove_if_exists(&paths.staging)?;
    let lossless_error = match backend.concat_copy(&paths.list_file, &paths.staging).await {
        Ok(()) => {
            promote(&paths.staging, request.output)?;
            tracing::info!(output = %request.output.display(), "Lossless merge complete");
            return Ok(MergeOutcome {
                method: MergeMethod::Lossless,
                output: request.output.to_path_buf(),
                lossless_error: None,
            });
        }
        Err(e) => e.to_string(),
    };

    tracing::warn!(error = %lossless_error, "Lossless merge failed, re-encoding");
    remove_if_exists(&paths.staging)?;

    let settings = TranscodeSettings::fixed(request.frame_rate);
    match backend
        .transcode(&paths.list_file, &paths.staging, &settings)
        .await
    {
        Ok(()) => {
            promote(&paths.staging, request.output)?;
            tracing::info!(
                output = %request.output.display(),
                crf = settings.crf,
                preset = %settings.preset,
                "Transcode merge complete"
            );
            Ok(MergeOutcome {
                method: MergeMethod::Transcode,
                output: request.output.to_path_buf(),
                lossless_error: Some(lossless_error),
            })
        }
        Err(e) => {
            remove_if_exists(&paths.staging)?;
            Err(SceneMuxError::MergeFailure {
                lossless: lossless_error,
                transcode: e.to_string(),
            })
        }
    }
}

fn promote(staging: &Path, output: &Path) -> SceneMuxResult<()> {
    if !staging.is_file() {
        return Err(anyhow::anyhow!(
            "merge reported success but {} was not written",
            staging.display()
        )
        .into());
    }
    std::fs::rename(staging, output)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> SceneMuxResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use scenemux_scene_model::QualityLevel;

    /// Backend that records calls and writes a marker file on success.
    struct FakeBackend {
        lossless_ok: bool,
        transcode_ok: bool,
        calls: Mutex<Vec<&'static str>>,
        transcode_settings: Mutex<Option<TranscodeSettings>>,
    }

    impl FakeBackend {
        fn new(lossless_ok: bool, transcode_ok: bool) -> Self {
            Self {
                lossless_ok,
                transcode_ok,
                calls: Mutex::new(Vec::new()),
                transcode_settings: Mutex::new(None),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MergeBackend for FakeBackend {
        async fn concat_copy(&self, list_file: &Path, output: &Path) -> SceneMuxResult<()> {
            self.calls.lock().unwrap().push("lossless");
            assert!(list_file.is_file());
            // A failing attempt may still leave a partial file behind.
            std::fs::write(output, b"copy")?;
            if self.lossless_ok {
                Ok(())
            } else {
                Err(anyhow::anyhow!("codec parameters differ").into())
            }
        }

        async fn transcode(
            &self,
            _list_file: &Path,
            output: &Path,
            settings: &TranscodeSettings,
        ) -> SceneMuxResult<()> {
            self.calls.lock().unwrap().push("transcode");
            *self.transcode_settings.lock().unwrap() = Some(settings.clone());
            std::fs::write(output, b"transcoded")?;
            if self.transcode_ok {
                Ok(())
            } else {
                Err(anyhow::anyhow!("encoder not found").into())
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        catalog: SceneCatalog,
        layout: MediaLayout,
        output: PathBuf,
    }

    fn fixture(render: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let catalog = SceneCatalog::new(["Intro", "Body", "Outro"]).unwrap();
        let layout = MediaLayout::new(
            dir.path().join("media"),
            Path::new("lesson.py"),
            QualityLevel::Medium,
        )
        .unwrap();
        std::fs::create_dir_all(layout.artifact_dir()).unwrap();
        for scene in catalog.iter().filter(|s| render.contains(&s.name.as_str())) {
            std::fs::write(layout.artifact_path(scene), b"video").unwrap();
        }
        let output = dir.path().join("final.mp4");
        Fixture {
            _dir: dir,
            catalog,
            layout,
            output,
        }
    }

    fn request(f: &Fixture, frame_rate: Option<u32>) -> MergeRequest<'_> {
        MergeRequest {
            catalog: &f.catalog,
            layout: &f.layout,
            output: &f.output,
            frame_rate,
        }
    }

    #[test]
    fn test_transcode_args_use_fixed_settings() {
        let args = FfmpegMerger::transcode_args(
            Path::new("/tmp/list.txt"),
            Path::new("/tmp/out.mp4"),
            &TranscodeSettings::fixed(Some(30)),
        );
        let joined: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        let joined = joined.join(" ");
        assert!(joined.contains("-f concat -safe 0 -i /tmp/list.txt"));
        assert!(joined.contains("-c:v libx264 -crf 18 -preset medium -pix_fmt yuv420p -r 30"));
        assert!(joined.ends_with("/tmp/out.mp4"));

        let no_fps = FfmpegMerger::transcode_args(
            Path::new("l"),
            Path::new("o.mp4"),
            &TranscodeSettings::fixed(None),
        );
        assert!(!no_fps.contains(&OsString::from("-r")));
    }

    #[test]
    fn test_lossless_args_copy_streams() {
        let args = FfmpegMerger::lossless_args(Path::new("l.txt"), Path::new("o.mp4"));
        let tail: Vec<&OsString> = args.iter().rev().take(3).collect();
        assert_eq!(tail[0], &OsString::from("o.mp4"));
        assert_eq!(tail[1], &OsString::from("copy"));
        assert_eq!(tail[2], &OsString::from("-c"));
    }

    #[test]
    fn test_merge_paths_are_hidden_siblings() {
        let paths = MergePaths::for_output(Path::new("/out/final.mp4")).unwrap();
        assert_eq!(paths.list_file, PathBuf::from("/out/.final.concat.txt"));
        assert_eq!(paths.staging, PathBuf::from("/out/.final.partial.mp4"));

        let bare = MergePaths::for_output(Path::new("final.mp4")).unwrap();
        assert_eq!(bare.list_file, PathBuf::from("./.final.concat.txt"));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        assert_eq!(stderr_tail("a\nb\nc\n", 2), "b | c");
        assert_eq!(stderr_tail("", 2), "");
    }

    #[tokio::test]
    async fn test_lossless_success_skips_transcode() {
        let f = fixture(&["Intro", "Body", "Outro"]);
        let backend = FakeBackend::new(true, true);
        let mut registry = ProcessRegistry::new();

        let outcome = merge_scenes(&request(&f, None), &mut registry, &backend)
            .await
            .unwrap();
        assert_eq!(outcome.method, MergeMethod::Lossless);
        assert_eq!(backend.calls(), vec!["lossless"]);
        assert_eq!(std::fs::read(&f.output).unwrap(), b"copy");

        // The list file is registered for cleanup and holds one line per scene.
        let paths = MergePaths::for_output(&f.output).unwrap();
        assert!(registry.temp_files().contains(&paths.list_file));
        let list = std::fs::read_to_string(&paths.list_file).unwrap();
        assert_eq!(list.lines().count(), 3);
        assert!(list.lines().next().unwrap().ends_with("720p30/Intro.mp4'"));
    }

    #[tokio::test]
    async fn test_lossless_failure_falls_back_to_transcode() {
        let f = fixture(&["Intro", "Body", "Outro"]);
        let backend = FakeBackend::new(false, true);
        let mut registry = ProcessRegistry::new();

        let outcome = merge_scenes(&request(&f, Some(30)), &mut registry, &backend)
            .await
            .unwrap();
        assert_eq!(outcome.method, MergeMethod::Transcode);
        assert!(outcome.lossless_error.unwrap().contains("codec parameters differ"));
        assert_eq!(backend.calls(), vec!["lossless", "transcode"]);
        assert_eq!(std::fs::read(&f.output).unwrap(), b"transcoded");

        let settings = backend.transcode_settings.lock().unwrap().clone().unwrap();
        assert_eq!(settings, TranscodeSettings::fixed(Some(30)));
    }

    #[tokio::test]
    async fn test_both_failures_leave_no_output() {
        let f = fixture(&["Intro", "Body", "Outro"]);
        let backend = FakeBackend::new(false, false);
        let mut registry = ProcessRegistry::new();

        let err = merge_scenes(&request(&f, None), &mut registry, &backend)
            .await
            .unwrap_err();
        match err {
            SceneMuxError::MergeFailure { lossless, transcode } => {
                assert!(lossless.contains("codec parameters differ"));
                assert!(transcode.contains("encoder not found"));
            }
            other => panic!("expected MergeFailure, got {other:?}"),
        }
        assert!(!f.output.exists());
        assert!(!MergePaths::for_output(&f.output).unwrap().staging.exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_stops_before_merge() {
        let f = fixture(&["Intro", "Outro"]);
        let backend = FakeBackend::new(true, true);
        let mut registry = ProcessRegistry::new();

        let err = merge_scenes(&request(&f, None), &mut registry, &backend)
            .await
            .unwrap_err();
        match err {
            SceneMuxError::MissingArtifact { scene, path } => {
                assert_eq!(scene, "Body");
                assert!(path.ends_with("videos/lesson/720p30/Body.mp4"));
            }
            other => panic!("expected MissingArtifact, got {other:?}"),
        }
        assert!(backend.calls().is_empty());
        assert!(registry.temp_files().is_empty());
    }
}
