//! Per-session JSON manifest.
//!
//! Written once at the end of a session and never mutated afterwards. It
//! records the inputs, the full settings used, the alignment outcome and
//! every stage of the clip plan so a run can be audited or reproduced.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::{AlignmentAnalysis, AlignmentStatus};
use crate::config::Settings;
use crate::slicing::ClipPlan;

/// Errors reading or writing a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source files of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInputs {
    pub base_video: PathBuf,
    pub overlay_video: PathBuf,
    pub overlay_audio: PathBuf,
}

/// Alignment outcome as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    /// Gated lag in seconds that was applied to the overlay audio.
    pub original_offset: f64,
    pub confidence: f64,
    /// The shifted overlay audio; absent in dry runs.
    pub shifted_audio_path: Option<PathBuf>,
    pub status: AlignmentStatus,
    pub base_envelope_len: usize,
    pub overlay_envelope_len: usize,
    /// Why the audio could not be analysed, when it could not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AlignmentRecord {
    pub fn from_analysis(analysis: &AlignmentAnalysis, shifted_audio_path: Option<PathBuf>) -> Self {
        Self {
            original_offset: analysis.result.lag_seconds,
            confidence: analysis.result.confidence,
            shifted_audio_path,
            status: analysis.result.status,
            base_envelope_len: analysis.base_envelope_len,
            overlay_envelope_len: analysis.overlay_envelope_len,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// What the media stages produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    /// Composited master the clips were cut from.
    pub master_video: Option<PathBuf>,
    pub clips_count: usize,
    pub exports_count: usize,
}

/// Output directories of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutputs {
    pub clips_src: PathBuf,
    pub exports: PathBuf,
}

/// The session manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    /// `session_YYYYmmdd_HHMMSS`.
    pub session_id: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    pub inputs: SessionInputs,
    pub config: Settings,
    pub alignment: AlignmentRecord,
    pub plan: ClipPlan,
    pub processing: ProcessingRecord,
    pub outputs: SessionOutputs,
}

impl SessionManifest {
    /// Final clip start times, in cut order.
    pub fn clip_starts(&self) -> &[f64] {
        &self.plan.clip_starts
    }

    /// Write the manifest as pretty JSON via a temp file and rename.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;

        tracing::debug!("Saved manifest to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Session identifier for a given local time.
pub fn session_id_for(time: &chrono::DateTime<chrono::Local>) -> String {
    format!("session_{}", time.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AlignmentResult;
    use crate::slicing::{Hook, HookRecommendation};
    use chrono::TimeZone;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn sample_manifest(root: &Path) -> SessionManifest {
        let analysis = AlignmentAnalysis {
            result: AlignmentResult::aligned(-0.1066666666666667, 0.734_219_876_5),
            base_envelope_len: 5626,
            overlay_envelope_len: 5480,
        };

        SessionManifest {
            session_id: "session_20260101_120000".to_string(),
            created_at: "2026-01-01T12:00:00+00:00".to_string(),
            inputs: SessionInputs {
                base_video: root.join("base.mp4"),
                overlay_video: root.join("face.mp4"),
                overlay_audio: root.join("voice.wav"),
            },
            config: Settings::default(),
            alignment: AlignmentRecord::from_analysis(&analysis, Some(root.join("voice_shifted.wav"))),
            plan: ClipPlan {
                clip_len: 20.0,
                uniform_starts: vec![0.0, 18.0, 36.0],
                scene_boundaries: vec![0.4170833333, 35.1],
                hooks: vec![Hook {
                    timestamp: 19.968,
                    hook_score: 0.6123456789012345,
                    breakdown: BTreeMap::from([("energy".to_string(), 0.9)]),
                    recommendation: HookRecommendation::Good,
                }],
                clip_starts: vec![0.4170833333, 19.968, 35.1],
            },
            processing: ProcessingRecord {
                master_video: Some(root.join("master.mp4")),
                clips_count: 3,
                exports_count: 3,
            },
            outputs: SessionOutputs {
                clips_src: root.join("clips_src"),
                exports: root.join("exports").join("9x16"),
            },
        }
    }

    #[test]
    fn manifest_round_trips_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let manifest = sample_manifest(dir.path());

        manifest.save(&path).unwrap();
        let loaded = SessionManifest::load(&path).unwrap();

        assert_eq!(loaded.clip_starts(), manifest.clip_starts());
        assert_eq!(
            loaded.alignment.original_offset.to_bits(),
            manifest.alignment.original_offset.to_bits()
        );
        assert_eq!(
            loaded.alignment.confidence.to_bits(),
            manifest.alignment.confidence.to_bits()
        );
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn manifest_has_load_bearing_keys() {
        let dir = tempdir().unwrap();
        let json = serde_json::to_value(sample_manifest(dir.path())).unwrap();

        let alignment = &json["alignment"];
        assert!(alignment["original_offset"].is_f64());
        assert!(alignment["confidence"].is_f64());
        assert!(alignment["shifted_audio_path"].is_string());
        assert_eq!(alignment["status"], "aligned");
        assert_eq!(json["plan"]["clip_starts"].as_array().unwrap().len(), 3);
        assert_eq!(json["config"]["export"]["ratio"], "9:16");
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("manifest.json");
        sample_manifest(dir.path()).save(&path).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn session_id_format() {
        let time = chrono::Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(session_id_for(&time), "session_20260304_050607");
    }
}
