//! Core types for audio analysis.

use serde::{Deserialize, Serialize};

/// Decoded mono audio.
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples as f64 (mono).
    pub samples: Vec<f64>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl AudioData {
    /// Create new audio data from samples.
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        let duration_secs = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / sample_rate as f64
        };
        Self {
            samples,
            sample_rate,
            duration_secs,
        }
    }

    /// Get the number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if audio data is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Borrow the samples between `start_secs` and `start_secs + duration_secs`.
    ///
    /// The window is clamped to the available audio, so a window starting
    /// past the end yields an empty slice.
    pub fn window(&self, start_secs: f64, duration_secs: f64) -> &[f64] {
        let rate = self.sample_rate as f64;
        let start = (start_secs.max(0.0) * rate).round() as usize;
        let len = (duration_secs.max(0.0) * rate).round() as usize;

        if start >= self.samples.len() {
            return &[];
        }
        let end = start.saturating_add(len).min(self.samples.len());
        &self.samples[start..end]
    }
}

/// A framewise feature signal sampled every `hop_length` samples.
///
/// An empty sequence means extraction produced no usable signal. Callers
/// treat it as a degenerate input, not as an error.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSequence {
    /// Feature values, one per frame.
    pub values: Vec<f64>,
    /// Hop between frames in samples.
    pub hop_length: usize,
    /// Sample rate of the source audio.
    pub sample_rate: u32,
}

impl FeatureSequence {
    pub fn new(values: Vec<f64>, hop_length: usize, sample_rate: u32) -> Self {
        Self {
            values,
            hop_length,
            sample_rate,
        }
    }

    /// An empty "no signal" sequence.
    pub fn empty(hop_length: usize, sample_rate: u32) -> Self {
        Self::new(Vec::new(), hop_length, sample_rate)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Seconds between consecutive frames.
    pub fn frame_period(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.hop_length as f64 / self.sample_rate as f64
    }

    /// Convert a frame index to a timestamp in seconds.
    pub fn frame_to_time(&self, frame: usize) -> f64 {
        frame as f64 * self.frame_period()
    }
}

/// Why an alignment result carries the value it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStatus {
    /// Lag was estimated and passed the confidence floor.
    Aligned,
    /// Lag was estimated but the confidence was too low; lag forced to zero.
    BelowThreshold,
    /// One of the feature sequences was empty; nothing could be estimated.
    NoSignal,
    /// The audio could not be decoded, so no estimate was attempted.
    DecodeFailed,
}

impl std::fmt::Display for AlignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignmentStatus::Aligned => write!(f, "aligned"),
            AlignmentStatus::BelowThreshold => write!(f, "below threshold"),
            AlignmentStatus::NoSignal => write!(f, "no signal"),
            AlignmentStatus::DecodeFailed => write!(f, "decode failed"),
        }
    }
}

/// Result of aligning an overlay feature sequence against a base sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Signed lag in seconds (positive = delay the overlay).
    pub lag_seconds: f64,
    /// Normalised peak correlation, roughly in [-1, 1].
    pub confidence: f64,
    /// How this result came about.
    pub status: AlignmentStatus,
}

impl AlignmentResult {
    /// A successfully estimated alignment.
    pub fn aligned(lag_seconds: f64, confidence: f64) -> Self {
        Self {
            lag_seconds,
            confidence,
            status: AlignmentStatus::Aligned,
        }
    }

    /// The degenerate "nothing to align" result.
    pub fn no_signal() -> Self {
        Self {
            lag_seconds: 0.0,
            confidence: 0.0,
            status: AlignmentStatus::NoSignal,
        }
    }

    /// Zero lag because the audio never reached the estimator.
    pub fn decode_failed() -> Self {
        Self {
            status: AlignmentStatus::DecodeFailed,
            ..Self::no_signal()
        }
    }

    /// Whether the lag is a real estimate rather than a fallback zero.
    pub fn is_aligned(&self) -> bool {
        self.status == AlignmentStatus::Aligned
    }

    /// Direction in which the overlay must be shifted.
    pub fn shift_direction(&self) -> ShiftDirection {
        ShiftDirection::from_lag(self.lag_seconds)
    }
}

/// How the overlay audio has to move to line up with the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftDirection {
    /// Pad silence at the front.
    Delay,
    /// Trim the leading portion.
    Advance,
}

impl ShiftDirection {
    /// Non-negative lags delay the overlay, negative lags advance it.
    pub fn from_lag(lag_seconds: f64) -> Self {
        if lag_seconds >= 0.0 {
            ShiftDirection::Delay
        } else {
            ShiftDirection::Advance
        }
    }
}

impl std::fmt::Display for ShiftDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShiftDirection::Delay => write!(f, "delay"),
            ShiftDirection::Advance => write!(f, "advance"),
        }
    }
}

/// Error types for analysis operations.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// FFmpeg execution failed.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// Audio extraction failed.
    #[error("Audio extraction failed: {0}")]
    ExtractionError(String),

    /// Invalid audio data.
    #[error("Invalid audio data: {0}")]
    InvalidAudio(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Source file not found.
    #[error("Source file not found: {0}")]
    SourceNotFound(String),
}

/// Type alias for analysis results.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
