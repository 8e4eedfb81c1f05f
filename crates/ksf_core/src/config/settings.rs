//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use serde::{Deserialize, Serialize};

use crate::models::{AspectRatio, OverlayPosition, QualityProfile};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Audio alignment settings.
    #[serde(default)]
    pub alignment: AlignmentSettings,

    /// Overlay compositing settings.
    #[serde(default)]
    pub overlay: OverlaySettings,

    /// Clip window selection settings.
    #[serde(default)]
    pub slicing: SlicingSettings,

    /// Export settings.
    #[serde(default)]
    pub export: ExportSettings,

    /// Batch processing settings.
    #[serde(default)]
    pub batch: BatchSettings,
}

/// Path configuration for output, temp, and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root folder sessions are created under.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for intermediate audio and video files.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_output_folder() -> String {
    "shortform_output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Use compact log format (filters noisy progress lines).
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of error lines to show in tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Prefix log lines with a timestamp.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_timestamps: true,
        }
    }
}

/// Audio alignment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSettings {
    /// Sample rate audio is decoded at for analysis and extraction.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Hop between onset envelope frames, in samples.
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,

    /// STFT window size.
    #[serde(default = "default_n_fft")]
    pub n_fft: usize,

    /// Minimum correlation confidence to apply a lag.
    #[serde(default = "default_min_conf")]
    pub min_conf: f64,

    /// Loudness target for the overlay audio (LUFS).
    #[serde(default = "default_target_lufs")]
    pub target_lufs: f64,
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_hop_length() -> usize {
    512
}

fn default_n_fft() -> usize {
    2048
}

fn default_min_conf() -> f64 {
    0.15
}

fn default_target_lufs() -> f64 {
    -14.0
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            hop_length: default_hop_length(),
            n_fft: default_n_fft(),
            min_conf: default_min_conf(),
            target_lufs: default_target_lufs(),
        }
    }
}

/// Overlay compositing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySettings {
    /// Named corner, `center`, or `x,y`.
    #[serde(default)]
    pub position: OverlayPosition,

    /// Overlay alpha in [0, 1].
    #[serde(default = "default_opacity")]
    pub opacity: f64,

    /// Distance from the frame edges for corner positions.
    #[serde(default = "default_margin_px")]
    pub margin_px: u32,
}

fn default_opacity() -> f64 {
    0.9
}

fn default_margin_px() -> u32 {
    24
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            position: OverlayPosition::default(),
            opacity: default_opacity(),
            margin_px: default_margin_px(),
        }
    }
}

/// Clip window selection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlicingSettings {
    /// Clip length in seconds.
    #[serde(default = "default_clip_len")]
    pub clip_len: f64,

    /// Distance between uniform window starts, in seconds.
    #[serde(default = "default_stride")]
    pub stride: f64,

    /// Snap windows onto scene boundaries.
    #[serde(default)]
    pub scene_detect: bool,

    /// Minimum spacing between scene boundaries.
    #[serde(default = "default_min_scene_len")]
    pub min_scene_len: f64,

    /// Bias windows toward audio hooks.
    #[serde(default)]
    pub hook_detect: bool,

    /// Number of hooks to look for.
    #[serde(default = "default_num_hooks")]
    pub num_hooks: usize,

    /// How far a hook pulls a window start, in seconds.
    #[serde(default = "default_attraction_radius")]
    pub attraction_radius: f64,

    /// Cap on the number of clips; unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_clips: Option<usize>,
}

fn default_clip_len() -> f64 {
    20.0
}

fn default_stride() -> f64 {
    18.0
}

fn default_min_scene_len() -> f64 {
    2.0
}

fn default_num_hooks() -> usize {
    10
}

fn default_attraction_radius() -> f64 {
    5.0
}

impl Default for SlicingSettings {
    fn default() -> Self {
        Self {
            clip_len: default_clip_len(),
            stride: default_stride(),
            scene_detect: false,
            min_scene_len: default_min_scene_len(),
            hook_detect: false,
            num_hooks: default_num_hooks(),
            attraction_radius: default_attraction_radius(),
            max_clips: None,
        }
    }
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Target aspect ratio, `W:H`.
    #[serde(default)]
    pub ratio: AspectRatio,

    /// Output height in pixels; the clip's own height when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Encoder profiles, best first. The first entry is used for export.
    #[serde(default = "QualityProfile::default_ladder")]
    pub quality_ladder: Vec<QualityProfile>,
}

impl ExportSettings {
    /// The profile exports are encoded with.
    pub fn primary_profile(&self) -> QualityProfile {
        self.quality_ladder.first().cloned().unwrap_or_default()
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            ratio: AspectRatio::default(),
            height: None,
            quality_ladder: QualityProfile::default_ladder(),
        }
    }
}

/// Batch processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Number of jobs processed at once.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_max_workers() -> usize {
    2
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Alignment,
    Overlay,
    Slicing,
    Export,
    Batch,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 7] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Alignment,
        ConfigSection::Overlay,
        ConfigSection::Slicing,
        ConfigSection::Export,
        ConfigSection::Batch,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Alignment => "alignment",
            ConfigSection::Overlay => "overlay",
            ConfigSection::Slicing => "slicing",
            ConfigSection::Export => "export",
            ConfigSection::Batch => "batch",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output and working directories",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Alignment => "Overlay audio alignment",
            ConfigSection::Overlay => "Overlay video placement",
            ConfigSection::Slicing => "Clip window selection",
            ConfigSection::Export => "Export format and encoder ladder",
            ConfigSection::Batch => "Batch processing",
        }
    }
}
