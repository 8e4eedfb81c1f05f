//! Types for media operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for ffmpeg/ffprobe operations.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to run {tool}: {message}")]
    ToolNotRun { tool: String, message: String },

    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("Failed to parse {tool} output: {message}")]
    ParseError { tool: String, message: String },

    #[error("Output file missing or empty: {0}")]
    OutputMissing(PathBuf),

    #[error("Incompatible media: {0}")]
    Incompatible(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Stderr captured from a failed tool run, if any.
    pub fn tool_output(&self) -> Option<&str> {
        match self {
            MediaError::CommandFailed { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// What a probed file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Has a video stream (audio optional).
    Video,
    /// Audio streams only.
    Audio,
    #[default]
    Unknown,
}

/// Stream and format details of a media file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub kind: MediaKind,
    /// Container duration in seconds; 0 when unknown.
    pub duration: f64,
    pub fps: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

impl MediaInfo {
    /// Frame size of the first video stream.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }

    pub fn has_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}
