//! Core types for the orchestrator pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::logging::SessionLogger;
use crate::media::MediaInfo;
use crate::models::{AlignmentRecord, AspectRatio, SessionInputs};
use crate::slicing::ClipPlan;

/// Progress callback type for reporting pipeline progress.
///
/// Arguments: (step_name, percent_complete, message)
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Directory layout of one session.
///
/// ```text
/// <out_root>/session_YYYYmmdd_HHMMSS/
///     manifest.json
///     clips_src/
///     exports/<W>x<H>/
/// ```
///
/// Intermediate audio and video files live directly in the session
/// directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPaths {
    pub session_dir: PathBuf,
    pub clips_src: PathBuf,
    pub exports: PathBuf,
    pub manifest_path: PathBuf,
}

impl SessionPaths {
    pub fn new(out_root: &Path, session_id: &str, ratio: &AspectRatio) -> Self {
        let session_dir = out_root.join(session_id);
        Self {
            clips_src: session_dir.join("clips_src"),
            exports: session_dir.join("exports").join(ratio.label()),
            manifest_path: session_dir.join("manifest.json"),
            session_dir,
        }
    }

    /// Create the session, clip and export directories.
    pub fn create_all(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.session_dir)?;
        std::fs::create_dir_all(&self.clips_src)?;
        std::fs::create_dir_all(&self.exports)?;
        Ok(())
    }

    /// Where intermediate files go.
    pub fn work_dir(&self) -> &Path {
        &self.session_dir
    }
}

/// Read-only context passed to pipeline steps.
///
/// Contains session configuration and shared resources that steps can
/// read but not modify. Mutable state goes in `JobState`.
pub struct Context {
    pub inputs: SessionInputs,
    pub settings: Settings,
    pub session_id: String,
    pub paths: SessionPaths,
    pub logger: Arc<SessionLogger>,
    /// Plan only; media steps skip themselves.
    pub dry_run: bool,
    pub write_manifest: bool,
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    pub fn new(
        inputs: SessionInputs,
        settings: Settings,
        session_id: impl Into<String>,
        paths: SessionPaths,
        logger: Arc<SessionLogger>,
    ) -> Self {
        Self {
            inputs,
            settings,
            session_id: session_id.into(),
            paths,
            logger,
            dry_run: false,
            write_manifest: true,
            progress_callback: None,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_manifest(mut self, write_manifest: bool) -> Self {
        self.write_manifest = write_manifest;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Report progress to callback (if set).
    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }
}

/// Mutable session state that accumulates results from pipeline steps.
///
/// Each step writes its own section once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    pub session_id: String,
    /// RFC 3339 start time.
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepare: Option<PrepareOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<CompositeOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<ClipPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clips: Option<ProducedFiles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exports: Option<ProducedFiles>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,
}

impl JobState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    /// Duration of the video clips are cut from.
    ///
    /// The composited master when it exists, otherwise the base video.
    pub fn source_duration(&self) -> Option<f64> {
        self.composite
            .as_ref()
            .map(|c| c.duration)
            .or_else(|| self.media.as_ref().map(|m| m.base.duration))
            .filter(|d| *d > 0.0)
    }

    pub fn clip_count(&self) -> usize {
        self.clips.as_ref().map(|c| c.files.len()).unwrap_or(0)
    }

    pub fn export_count(&self) -> usize {
        self.exports.as_ref().map(|e| e.files.len()).unwrap_or(0)
    }
}

/// Output from the Validate step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaOutput {
    pub base: MediaInfo,
    pub overlay_audio: MediaInfo,
    pub warnings: Vec<String>,
}

/// Output from the PrepareAudio step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareOutput {
    /// Base video's audio as mono WAV.
    pub base_audio: PathBuf,
    /// Loudness-normalised overlay audio.
    pub overlay_audio: PathBuf,
}

/// Output from the Composite step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeOutput {
    /// Base video with the shifted overlay audio.
    pub video_with_audio: PathBuf,
    /// `video_with_audio` with the overlay video on top.
    pub master: PathBuf,
    pub duration: f64,
}

/// Files produced by the Cut or Export step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProducedFiles {
    pub files: Vec<PathBuf>,
    /// Items that failed and were skipped.
    pub failed: usize,
}

/// Result of executing a pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step completed successfully.
    Success,
    /// Step was skipped (nothing to do, but not an error).
    Skipped(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;

    #[test]
    fn session_paths_layout() {
        let paths = SessionPaths::new(
            Path::new("/out"),
            "session_20260101_120000",
            &AspectRatio::VERTICAL,
        );
        assert_eq!(paths.session_dir, PathBuf::from("/out/session_20260101_120000"));
        assert_eq!(paths.clips_src, PathBuf::from("/out/session_20260101_120000/clips_src"));
        assert_eq!(paths.exports, PathBuf::from("/out/session_20260101_120000/exports/9x16"));
        assert_eq!(
            paths.manifest_path,
            PathBuf::from("/out/session_20260101_120000/manifest.json")
        );
    }

    #[test]
    fn create_all_makes_directories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SessionPaths::new(dir.path(), "session_x", &AspectRatio::new(1, 1));
        paths.create_all().unwrap();
        assert!(paths.clips_src.is_dir());
        assert!(paths.exports.is_dir());
        assert!(paths.exports.ends_with("exports/1x1"));
    }

    #[test]
    fn source_duration_prefers_master() {
        let mut state = JobState::new("s");
        assert_eq!(state.source_duration(), None);

        state.media = Some(MediaOutput {
            base: MediaInfo {
                kind: MediaKind::Video,
                duration: 100.0,
                ..Default::default()
            },
            overlay_audio: MediaInfo::default(),
            warnings: Vec::new(),
        });
        assert_eq!(state.source_duration(), Some(100.0));

        state.composite = Some(CompositeOutput {
            video_with_audio: "a.mp4".into(),
            master: "m.mp4".into(),
            duration: 98.5,
        });
        assert_eq!(state.source_duration(), Some(98.5));
    }

    #[test]
    fn job_state_serializes() {
        let state = JobState::new("session_x");
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"session_id\":\"session_x\""));
        assert!(!json.contains("composite"));
    }
}
