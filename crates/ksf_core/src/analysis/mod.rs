//! Audio analysis for overlay alignment.
//!
//! # Architecture
//!
//! The analysis layer is a set of pure functions plus two small stateful
//! helpers that cache FFT plans:
//!
//! 1. **Decoding** (`ffmpeg`): decode a media file to mono f64 samples.
//!
//! 2. **Features** (`features`): onset strength and energy envelopes, hook
//!    window features, voice activity. [`SignalExtractor`] owns the STFT.
//!
//! 3. **Correlation** (`correlation`): lag and confidence between two onset
//!    envelopes, followed by the confidence gate. [`AlignmentEstimator`]
//!    owns the correlation FFTs.
//!
//! 4. **Peaks** (`peaks`): peak picking used by the hook finder.
//!
//! # Usage
//!
//! ```ignore
//! use ksf_core::analysis::{decode_audio, align_audio, DEFAULT_ANALYSIS_SAMPLE_RATE};
//!
//! let base = decode_audio(base_path, DEFAULT_ANALYSIS_SAMPLE_RATE)?;
//! let overlay = decode_audio(overlay_path, DEFAULT_ANALYSIS_SAMPLE_RATE)?;
//!
//! let analysis = align_audio(&base, &overlay, 0.15);
//! println!("offset {:+.3}s ({})", analysis.result.lag_seconds, analysis.result.status);
//! ```

mod correlation;
mod ffmpeg;
pub mod features;
pub mod peaks;
pub mod types;

#[cfg(test)]
pub(crate) mod test_signals;

pub use types::{
    AlignmentResult, AlignmentStatus, AnalysisError, AnalysisResult, AudioData, FeatureSequence,
    ShiftDirection,
};

pub use correlation::{
    align_audio, apply_confidence_gate, estimate_lag, AlignmentAnalysis, AlignmentEstimator,
    DEFAULT_MIN_CONFIDENCE,
};

pub use features::{
    detect_voice_activity, extract_energy_envelope, extract_hook_features,
    extract_onset_envelope, HookFeatures, HookScores, SignalExtractor,
};

pub use ffmpeg::{decode_audio, get_duration, DEFAULT_ANALYSIS_SAMPLE_RATE};

pub use peaks::find_peaks;
