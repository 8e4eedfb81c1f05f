//! Framewise feature extraction.
//!
//! Everything here turns a mono waveform into a [`FeatureSequence`] sampled
//! every `hop_length` samples:
//!
//! - onset strength envelope (spectral flux of an STFT magnitude
//!   spectrogram, z-score normalised) used for alignment
//! - energy envelope (framewise RMS, min-max normalised) used for hook peaks
//! - hook features (energy, dynamics, zero crossings, spectral centroid)
//!   summarising a short window
//! - voice activity segments from a blend of RMS and zero-crossing rate
//!
//! Frames are centred: the signal is padded by half a frame on each side so
//! frame `t` is centred on sample `t * hop_length`. A waveform of `n`
//! samples therefore yields `1 + n / hop_length` frames.
//!
//! Degenerate input (empty or non-finite waveform) yields an empty sequence.
//! It is never an error.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use parking_lot::Mutex;
use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::analysis::types::FeatureSequence;

/// Default STFT window size.
pub const DEFAULT_N_FFT: usize = 2048;
/// Default hop between frames.
pub const DEFAULT_HOP_LENGTH: usize = 512;
/// Default frame length for RMS and zero-crossing features.
pub const DEFAULT_FRAME_LENGTH: usize = 2048;
/// Default voice activity threshold.
pub const DEFAULT_VAD_THRESHOLD: f64 = 0.3;

const EPSILON: f64 = 1e-10;
/// Samples with magnitude at or below this count as zero for crossings.
const ZERO_CROSSING_THRESHOLD: f64 = 1e-10;

/// How to fill the half-frame margins around the signal.
#[derive(Debug, Clone, Copy)]
enum PadMode {
    Zero,
    Edge,
}

/// Extracts framewise features from mono waveforms.
///
/// The FFT planner is cached and shared across calls.
pub struct SignalExtractor {
    n_fft: usize,
    hop_length: usize,
    frame_length: usize,
    planner: Mutex<FftPlanner<f64>>,
}

impl SignalExtractor {
    /// Create an extractor with n_fft=2048, hop_length=512, frame_length=2048.
    pub fn new() -> Self {
        Self {
            n_fft: DEFAULT_N_FFT,
            hop_length: DEFAULT_HOP_LENGTH,
            frame_length: DEFAULT_FRAME_LENGTH,
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    pub fn with_n_fft(mut self, n_fft: usize) -> Self {
        self.n_fft = n_fft.max(2);
        self
    }

    pub fn with_hop_length(mut self, hop_length: usize) -> Self {
        self.hop_length = hop_length.max(1);
        self
    }

    pub fn with_frame_length(mut self, frame_length: usize) -> Self {
        self.frame_length = frame_length.max(1);
        self
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Periodic Hann window.
    fn hann_window(size: usize) -> Vec<f64> {
        (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
            .collect()
    }

    /// Pad the signal by half a frame on each side.
    fn pad_centered(samples: &[f64], frame_length: usize, mode: PadMode) -> Vec<f64> {
        let pad = frame_length / 2;
        let (head, tail) = match mode {
            PadMode::Zero => (0.0, 0.0),
            PadMode::Edge => (
                samples.first().copied().unwrap_or(0.0),
                samples.last().copied().unwrap_or(0.0),
            ),
        };

        let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
        padded.resize(pad, head);
        padded.extend_from_slice(samples);
        padded.resize(samples.len() + 2 * pad, tail);
        padded
    }

    fn frame_count(padded_len: usize, frame_length: usize, hop_length: usize) -> usize {
        if padded_len < frame_length {
            0
        } else {
            1 + (padded_len - frame_length) / hop_length
        }
    }

    /// Visit the STFT magnitudes frame by frame.
    ///
    /// `visit` gets one row of `n_fft / 2 + 1` bins per frame. The FFT
    /// buffer and the row are reused, so memory stays at one frame however
    /// long the signal is. Returns the number of frames visited.
    fn for_each_stft_frame(&self, samples: &[f64], mut visit: impl FnMut(&[f64])) -> usize {
        if samples.is_empty() {
            return 0;
        }

        let padded = Self::pad_centered(samples, self.n_fft, PadMode::Zero);
        let num_frames = Self::frame_count(padded.len(), self.n_fft, self.hop_length);
        let num_bins = self.n_fft / 2 + 1;
        let window = Self::hann_window(self.n_fft);

        let fft = self.planner.lock().plan_fft_forward(self.n_fft);
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let mut magnitudes = vec![0.0; num_bins];

        for frame in 0..num_frames {
            let start = frame * self.hop_length;
            for ((slot, &s), &w) in buffer
                .iter_mut()
                .zip(&padded[start..start + self.n_fft])
                .zip(window.iter())
            {
                *slot = Complex::new(s * w, 0.0);
            }

            fft.process_with_scratch(&mut buffer, &mut scratch);

            for (mag, c) in magnitudes.iter_mut().zip(&buffer[..num_bins]) {
                *mag = c.norm();
            }
            visit(&magnitudes);
        }

        num_frames
    }

    /// Onset strength envelope.
    ///
    /// Spectral flux (positive frame-to-frame magnitude differences summed
    /// over bins), z-score normalised with `std + 1e-10`. The first frame has
    /// no predecessor and gets zero flux. Fewer than two frames means there
    /// is nothing to difference and the result is empty.
    pub fn onset_envelope(&self, samples: &[f64], sample_rate: u32) -> FeatureSequence {
        if !is_usable(samples) {
            return FeatureSequence::empty(self.hop_length, sample_rate);
        }

        let mut envelope = Vec::new();
        let mut previous: Option<Vec<f64>> = None;
        let frames = self.for_each_stft_frame(samples, |bins| match previous.as_mut() {
            Some(prev) => {
                let flux: f64 = bins
                    .iter()
                    .zip(prev.iter())
                    .map(|(cur, prev)| (cur - prev).max(0.0))
                    .sum();
                envelope.push(flux);
                prev.copy_from_slice(bins);
            }
            None => {
                envelope.push(0.0);
                previous = Some(bins.to_vec());
            }
        });

        if frames < 2 {
            return FeatureSequence::empty(self.hop_length, sample_rate);
        }

        z_score(&mut envelope);

        tracing::debug!(
            "Onset envelope: {} frames from {} samples",
            envelope.len(),
            samples.len()
        );

        FeatureSequence::new(envelope, self.hop_length, sample_rate)
    }

    /// Framewise RMS over zero-padded centred frames (unnormalised).
    pub fn rms(&self, samples: &[f64]) -> Vec<f64> {
        if samples.is_empty() {
            return Vec::new();
        }

        let padded = Self::pad_centered(samples, self.frame_length, PadMode::Zero);
        let num_frames = Self::frame_count(padded.len(), self.frame_length, self.hop_length);

        (0..num_frames)
            .map(|frame| {
                let start = frame * self.hop_length;
                let window = &padded[start..start + self.frame_length];
                let power = window.iter().map(|s| s * s).sum::<f64>() / self.frame_length as f64;
                power.sqrt()
            })
            .collect()
    }

    /// Framewise zero-crossing rate over edge-padded centred frames.
    ///
    /// Crossings are sign changes between consecutive samples, with
    /// near-zero samples counted as positive, divided by the frame length.
    pub fn zero_crossing_rate(&self, samples: &[f64]) -> Vec<f64> {
        if samples.is_empty() {
            return Vec::new();
        }

        let padded = Self::pad_centered(samples, self.frame_length, PadMode::Edge);
        let negative: Vec<bool> = padded
            .iter()
            .map(|&s| s.abs() > ZERO_CROSSING_THRESHOLD && s < 0.0)
            .collect();
        let num_frames = Self::frame_count(padded.len(), self.frame_length, self.hop_length);

        (0..num_frames)
            .map(|frame| {
                let start = frame * self.hop_length;
                let signs = &negative[start..start + self.frame_length];
                let crossings = signs.windows(2).filter(|w| w[0] != w[1]).count();
                crossings as f64 / self.frame_length as f64
            })
            .collect()
    }

    /// Framewise spectral centroid in Hz. Silent frames have centroid zero.
    pub fn spectral_centroid(&self, samples: &[f64], sample_rate: u32) -> Vec<f64> {
        let bin_hz = sample_rate as f64 / self.n_fft as f64;

        let mut centroids = Vec::new();
        self.for_each_stft_frame(samples, |bins| {
            let total: f64 = bins.iter().sum();
            if total <= EPSILON {
                centroids.push(0.0);
                return;
            }
            let weighted: f64 = bins
                .iter()
                .enumerate()
                .map(|(k, mag)| k as f64 * bin_hz * mag)
                .sum();
            centroids.push(weighted / total);
        });
        centroids
    }

    /// Energy envelope and the waveform duration in seconds.
    ///
    /// RMS min-max normalised as `(x - min) / (max - min + 1e-10)`, so a
    /// silent waveform yields an all-zero envelope.
    pub fn energy_envelope(&self, samples: &[f64], sample_rate: u32) -> (FeatureSequence, f64) {
        let duration = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f64 / sample_rate as f64
        };

        if !is_usable(samples) {
            return (FeatureSequence::empty(self.hop_length, sample_rate), duration);
        }

        let mut rms = self.rms(samples);
        min_max_normalize(&mut rms);

        (FeatureSequence::new(rms, self.hop_length, sample_rate), duration)
    }

    /// Summarise a short window for hook scoring.
    ///
    /// Returns `None` when the window holds no usable audio.
    pub fn hook_features(&self, window: &[f64], sample_rate: u32) -> Option<HookFeatures> {
        if !is_usable(window) {
            return None;
        }

        let rms = self.rms(window);
        let zcr = self.zero_crossing_rate(window);
        let centroid = self.spectral_centroid(window, sample_rate);

        let energy_mean = mean(&rms);
        let energy_std = std_dev(&rms, energy_mean);

        Some(HookFeatures {
            energy_mean,
            energy_std,
            zero_crossing_mean: mean(&zcr),
            spectral_centroid_mean: mean(&centroid),
            sample_rate,
        })
    }

    /// Voice activity segments as `(start, end)` seconds.
    ///
    /// Per-frame voice probability is `0.3 * zcr_norm + 0.7 * rms_norm`,
    /// both min-max normalised. Frames strictly above `threshold` are
    /// voiced. A segment still open at the end closes at the last frame.
    pub fn voice_activity(
        &self,
        samples: &[f64],
        sample_rate: u32,
        threshold: f64,
    ) -> Vec<(f64, f64)> {
        if !is_usable(samples) || sample_rate == 0 {
            return Vec::new();
        }

        let mut zcr = self.zero_crossing_rate(samples);
        let mut rms = self.rms(samples);
        min_max_normalize(&mut zcr);
        min_max_normalize(&mut rms);

        let frame_time = |frame: usize| frame as f64 * self.hop_length as f64 / sample_rate as f64;

        let mut segments = Vec::new();
        let mut open: Option<f64> = None;

        for (frame, (z, r)) in zcr.iter().zip(rms.iter()).enumerate() {
            let voiced = 0.3 * z + 0.7 * r > threshold;
            match (voiced, open) {
                (true, None) => open = Some(frame_time(frame)),
                (false, Some(start)) => {
                    segments.push((start, frame_time(frame)));
                    open = None;
                }
                _ => {}
            }
        }

        if let Some(start) = open {
            let last = zcr.len().min(rms.len()).saturating_sub(1);
            segments.push((start, frame_time(last)));
        }

        segments
    }
}

impl Default for SignalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw measurements of a hook candidate window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HookFeatures {
    /// Mean framewise RMS.
    pub energy_mean: f64,
    /// Standard deviation of framewise RMS.
    pub energy_std: f64,
    /// Mean zero-crossing rate.
    pub zero_crossing_mean: f64,
    /// Mean spectral centroid in Hz.
    pub spectral_centroid_mean: f64,
    /// Sample rate the window was analysed at.
    pub sample_rate: u32,
}

impl HookFeatures {
    /// Scale each measurement into a [0, 1] score.
    pub fn scores(&self) -> HookScores {
        let brightness = if self.sample_rate == 0 {
            0.0
        } else {
            self.spectral_centroid_mean / self.sample_rate as f64
        };

        HookScores {
            energy: (self.energy_mean * 10.0).clamp(0.0, 1.0),
            dynamics: (self.energy_std * 5.0).clamp(0.0, 1.0),
            voice: (self.zero_crossing_mean * 2.0).clamp(0.0, 1.0),
            brightness: (brightness * 2.0).clamp(0.0, 1.0),
        }
    }
}

/// Per-feature hook scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HookScores {
    pub energy: f64,
    pub dynamics: f64,
    pub voice: f64,
    pub brightness: f64,
}

impl HookScores {
    pub const ENERGY_WEIGHT: f64 = 0.4;
    pub const DYNAMICS_WEIGHT: f64 = 0.3;
    pub const VOICE_WEIGHT: f64 = 0.2;
    pub const BRIGHTNESS_WEIGHT: f64 = 0.1;

    /// Weighted hook score in [0, 1].
    pub fn weighted(&self) -> f64 {
        Self::ENERGY_WEIGHT * self.energy
            + Self::DYNAMICS_WEIGHT * self.dynamics
            + Self::VOICE_WEIGHT * self.voice
            + Self::BRIGHTNESS_WEIGHT * self.brightness
    }

    /// Named breakdown for reporting.
    pub fn breakdown(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("energy".to_string(), self.energy),
            ("dynamics".to_string(), self.dynamics),
            ("voice".to_string(), self.voice),
            ("brightness".to_string(), self.brightness),
        ])
    }
}

/// Onset strength envelope with the default extractor settings.
pub fn extract_onset_envelope(waveform: &[f64], sample_rate: u32) -> FeatureSequence {
    SignalExtractor::new().onset_envelope(waveform, sample_rate)
}

/// Energy envelope and duration with the default extractor settings.
pub fn extract_energy_envelope(waveform: &[f64], sample_rate: u32) -> (FeatureSequence, f64) {
    SignalExtractor::new().energy_envelope(waveform, sample_rate)
}

/// Hook features for a window with the default extractor settings.
pub fn extract_hook_features(window: &[f64], sample_rate: u32) -> Option<HookFeatures> {
    SignalExtractor::new().hook_features(window, sample_rate)
}

/// Voice activity segments with the default extractor settings.
pub fn detect_voice_activity(waveform: &[f64], sample_rate: u32, threshold: f64) -> Vec<(f64, f64)> {
    SignalExtractor::new().voice_activity(waveform, sample_rate, threshold)
}

fn is_usable(samples: &[f64]) -> bool {
    if samples.is_empty() {
        return false;
    }
    if samples.iter().any(|s| !s.is_finite()) {
        tracing::warn!("Waveform contains non-finite samples, treating as no signal");
        return false;
    }
    true
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn z_score(values: &mut [f64]) {
    let m = mean(values);
    let s = std_dev(values, m);
    for v in values.iter_mut() {
        *v = (*v - m) / (s + EPSILON);
    }
}

fn min_max_normalize(values: &mut [f64]) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    for v in values.iter_mut() {
        *v = (*v - min) / (max - min + EPSILON);
    }
}
