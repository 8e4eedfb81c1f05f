//! Onset-envelope cross-correlation.
//!
//! The overlay's onset envelope is slid across the base's envelope and the
//! lag with the strongest agreement wins. Both envelopes are right-padded
//! with zeros to a common length `N` and the full linear cross-correlation
//!
//! ```text
//! c[k] = sum_n base[n + k] * overlay[n],   k = -(N-1) ..= N-1
//! ```
//!
//! is evaluated. The first index of the maximum gives
//! `lag_frames = idx - (N - 1)`, converted to seconds through the hop and
//! sample rate. Confidence is the peak normalised by the product of the
//! envelope norms, so identical envelopes score ~1.0.
//!
//! Small inputs are correlated directly; larger ones go through an FFT of
//! the same linear correlation.

use parking_lot::Mutex;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::analysis::features::SignalExtractor;
use crate::analysis::types::{AlignmentResult, AlignmentStatus, AudioData};

/// Default minimum confidence for accepting a lag.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.15;

/// Above this padded length the correlation is computed with an FFT.
const DIRECT_CORRELATION_MAX_LEN: usize = 4096;

const EPSILON: f64 = 1e-10;

/// Estimates the lag between two onset envelopes.
pub struct AlignmentEstimator {
    min_confidence: f64,
    planner: Mutex<FftPlanner<f64>>,
}

impl AlignmentEstimator {
    pub fn new() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    /// Set the confidence floor used by [`align`](Self::align).
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Raw lag estimate, without the confidence gate.
    ///
    /// Either envelope empty yields a `NoSignal` result.
    pub fn estimate(
        &self,
        base: &[f64],
        overlay: &[f64],
        hop_length: usize,
        sample_rate: u32,
    ) -> AlignmentResult {
        if base.is_empty() || overlay.is_empty() || sample_rate == 0 {
            return AlignmentResult::no_signal();
        }

        let n = base.len().max(overlay.len());
        let mut a = base.to_vec();
        let mut v = overlay.to_vec();
        a.resize(n, 0.0);
        v.resize(n, 0.0);

        let full = if n <= DIRECT_CORRELATION_MAX_LEN {
            correlate_direct(&a, &v)
        } else {
            self.correlate_fft(&a, &v)
        };

        let (idx, peak) = first_argmax(&full);
        let lag_frames = idx as i64 - (n as i64 - 1);
        let lag_seconds = lag_frames as f64 * hop_length as f64 / sample_rate as f64;

        let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
        let norm_v = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        let confidence = peak / (norm_a * norm_v + EPSILON);

        tracing::debug!(
            "Cross-correlation: N={}, peak index {}, lag {} frames ({:.3}s), confidence {:.3}",
            n,
            idx,
            lag_frames,
            lag_seconds,
            confidence
        );

        AlignmentResult::aligned(lag_seconds, confidence)
    }

    /// Estimate the lag and apply the confidence gate.
    pub fn align(
        &self,
        base: &[f64],
        overlay: &[f64],
        hop_length: usize,
        sample_rate: u32,
    ) -> AlignmentResult {
        let raw = self.estimate(base, overlay, hop_length, sample_rate);
        let gated = apply_confidence_gate(raw, self.min_confidence);

        if raw.status == AlignmentStatus::Aligned && !gated.is_aligned() {
            tracing::warn!(
                "Low alignment confidence ({:.3} < {:.3}), using zero offset",
                raw.confidence,
                self.min_confidence
            );
        }

        gated
    }

    /// Extract onset envelopes from both waveforms and align them.
    ///
    /// The waveforms must share a sample rate; a mismatch is treated as no
    /// signal rather than producing a lag in the wrong units.
    pub fn align_audio(
        &self,
        extractor: &SignalExtractor,
        base: &AudioData,
        overlay: &AudioData,
    ) -> AlignmentAnalysis {
        if base.sample_rate != overlay.sample_rate {
            tracing::warn!(
                "Sample rate mismatch ({} vs {}), cannot align",
                base.sample_rate,
                overlay.sample_rate
            );
            return AlignmentAnalysis {
                result: AlignmentResult::no_signal(),
                base_envelope_len: 0,
                overlay_envelope_len: 0,
            };
        }

        let base_env = extractor.onset_envelope(&base.samples, base.sample_rate);
        let overlay_env = extractor.onset_envelope(&overlay.samples, overlay.sample_rate);

        let result = self.align(
            &base_env.values,
            &overlay_env.values,
            extractor.hop_length(),
            base.sample_rate,
        );

        AlignmentAnalysis {
            result,
            base_envelope_len: base_env.len(),
            overlay_envelope_len: overlay_env.len(),
        }
    }

    /// Full linear cross-correlation via zero-padded FFTs.
    fn correlate_fft(&self, a: &[f64], v: &[f64]) -> Vec<f64> {
        let n = a.len();
        let out_len = 2 * n - 1;
        let fft_len = out_len.next_power_of_two();

        let (fft, ifft) = {
            let mut planner = self.planner.lock();
            (
                planner.plan_fft_forward(fft_len),
                planner.plan_fft_inverse(fft_len),
            )
        };

        let to_complex = |x: &[f64]| {
            let mut buf: Vec<Complex<f64>> = x.iter().map(|&s| Complex::new(s, 0.0)).collect();
            buf.resize(fft_len, Complex::new(0.0, 0.0));
            buf
        };

        let mut a_fft = to_complex(a);
        let mut v_fft = to_complex(v);
        fft.process(&mut a_fft);
        fft.process(&mut v_fft);

        let mut cross: Vec<Complex<f64>> = a_fft
            .iter()
            .zip(v_fft.iter())
            .map(|(x, y)| x * y.conj())
            .collect();
        ifft.process(&mut cross);

        // Circular index k >= 0 holds lag k, index L + k holds lag k < 0.
        let scale = fft_len as f64;
        (0..out_len)
            .map(|i| {
                let lag = i as i64 - (n as i64 - 1);
                let idx = if lag >= 0 {
                    lag as usize
                } else {
                    (fft_len as i64 + lag) as usize
                };
                cross[idx].re / scale
            })
            .collect()
    }
}

impl Default for AlignmentEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Gated alignment plus the envelope sizes it was computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentAnalysis {
    pub result: AlignmentResult,
    pub base_envelope_len: usize,
    pub overlay_envelope_len: usize,
}

/// Lag and confidence between two envelopes, ungated.
pub fn estimate_lag(
    base: &[f64],
    overlay: &[f64],
    hop_length: usize,
    sample_rate: u32,
) -> AlignmentResult {
    AlignmentEstimator::new().estimate(base, overlay, hop_length, sample_rate)
}

/// Force low-confidence estimates to a zero lag.
///
/// Confidence below `min_confidence` (or NaN) yields lag 0.0, confidence
/// 0.0 and status `BelowThreshold`. `NoSignal` and `DecodeFailed` results
/// pass through untouched. Applying the gate twice gives the same result as
/// once.
pub fn apply_confidence_gate(result: AlignmentResult, min_confidence: f64) -> AlignmentResult {
    if matches!(
        result.status,
        AlignmentStatus::NoSignal | AlignmentStatus::DecodeFailed
    ) {
        return result;
    }

    if result.confidence.is_nan() || result.confidence < min_confidence {
        return AlignmentResult {
            lag_seconds: 0.0,
            confidence: 0.0,
            status: AlignmentStatus::BelowThreshold,
        };
    }

    result
}

/// Decode-free convenience: onset envelopes, lag, gate.
pub fn align_audio(base: &AudioData, overlay: &AudioData, min_confidence: f64) -> AlignmentAnalysis {
    AlignmentEstimator::new()
        .with_min_confidence(min_confidence)
        .align_audio(&SignalExtractor::new(), base, overlay)
}

/// Direct O(N^2) evaluation; output index `i` holds lag `i - (N-1)`.
fn correlate_direct(a: &[f64], v: &[f64]) -> Vec<f64> {
    let n = a.len();
    (0..2 * n - 1)
        .map(|i| {
            let lag = i as i64 - (n as i64 - 1);
            let (a_start, v_start) = if lag >= 0 {
                (lag as usize, 0)
            } else {
                (0, (-lag) as usize)
            };
            a[a_start..]
                .iter()
                .zip(v[v_start..].iter())
                .map(|(x, y)| x * y)
                .sum()
        })
        .collect()
}

/// Index and value of the first maximum.
fn first_argmax(values: &[f64]) -> (usize, f64) {
    let mut best_idx = 0;
    let mut best = f64::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best {
            best = v;
            best_idx = i;
        }
    }
    (best_idx, best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::test_signals::{impulse, noise as envelope};

    const HOP: usize = 512;
    const SR: u32 = 48000;

    #[test]
    fn impulse_lag_follows_correlation_definition() {
        // base impulse at 10, overlay impulse at 3: c[k] peaks where
        // base[n + k] and overlay[n] line up, n = 3, k = 7.
        let base = impulse(20, 10);
        let overlay = impulse(20, 3);
        let result = estimate_lag(&base, &overlay, HOP, SR);

        let expected = 7.0 * HOP as f64 / SR as f64;
        assert!((result.lag_seconds - expected).abs() < 1e-12);
        assert!((result.confidence - 1.0).abs() < 1e-6);
        assert_eq!(result.status, AlignmentStatus::Aligned);
    }

    #[test]
    fn self_alignment_is_zero_lag_full_confidence() {
        let env = envelope(500, 7);
        let result = estimate_lag(&env, &env, HOP, SR);
        assert_eq!(result.lag_seconds, 0.0);
        assert!((result.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn swapping_arguments_negates_lag() {
        let base = envelope(400, 1);
        let mut overlay = vec![0.0; 25];
        overlay.extend_from_slice(&base[..375]);

        let forward = estimate_lag(&base, &overlay, HOP, SR);
        let backward = estimate_lag(&overlay, &base, HOP, SR);

        assert!(forward.lag_seconds != 0.0);
        assert!((forward.lag_seconds + backward.lag_seconds).abs() < 1e-12);
        assert!((forward.confidence - backward.confidence).abs() < 1e-9);
    }

    #[test]
    fn unequal_lengths_are_padded() {
        let base = impulse(30, 12);
        let overlay = impulse(10, 2);
        let result = estimate_lag(&base, &overlay, HOP, SR);
        assert!((result.lag_seconds - 10.0 * HOP as f64 / SR as f64).abs() < 1e-12);
    }

    #[test]
    fn empty_envelope_is_no_signal() {
        let env = envelope(50, 3);
        let result = estimate_lag(&[], &env, HOP, SR);
        assert_eq!(result.status, AlignmentStatus::NoSignal);
        assert_eq!(result.lag_seconds, 0.0);
        assert_eq!(result.confidence, 0.0);

        let result = estimate_lag(&env, &[], HOP, SR);
        assert_eq!(result.status, AlignmentStatus::NoSignal);
    }

    #[test]
    fn fft_path_matches_direct_path() {
        let estimator = AlignmentEstimator::new();
        let a = envelope(300, 11);
        let v = envelope(300, 12);

        let direct = correlate_direct(&a, &v);
        let fft = estimator.correlate_fft(&a, &v);

        assert_eq!(direct.len(), fft.len());
        for (d, f) in direct.iter().zip(fft.iter()) {
            assert!((d - f).abs() < 1e-9);
        }
    }

    #[test]
    fn long_envelopes_use_fft_and_find_offset() {
        let base = envelope(6000, 21);
        let mut overlay = vec![0.0; 150];
        overlay.extend_from_slice(&base[..5850]);

        let result = estimate_lag(&base, &overlay, HOP, SR);
        let expected = -150.0 * HOP as f64 / SR as f64;
        assert!((result.lag_seconds - expected).abs() < 1e-9);
        assert!(result.confidence > 0.9);
    }

    #[test]
    fn gate_zeroes_low_confidence() {
        let raw = AlignmentResult::aligned(1.5, 0.1);
        let gated = apply_confidence_gate(raw, 0.15);
        assert_eq!(gated.lag_seconds, 0.0);
        assert_eq!(gated.confidence, 0.0);
        assert_eq!(gated.status, AlignmentStatus::BelowThreshold);

        let passing = AlignmentResult::aligned(1.5, 0.4);
        assert_eq!(apply_confidence_gate(passing, 0.15), passing);
    }

    #[test]
    fn gate_is_idempotent() {
        for raw in [
            AlignmentResult::aligned(2.0, 0.05),
            AlignmentResult::aligned(-0.7, 0.6),
            AlignmentResult::no_signal(),
        ] {
            let once = apply_confidence_gate(raw, 0.15);
            let twice = apply_confidence_gate(once, 0.15);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn gate_keeps_no_signal_status() {
        let gated = apply_confidence_gate(AlignmentResult::no_signal(), 0.15);
        assert_eq!(gated.status, AlignmentStatus::NoSignal);

        let gated = apply_confidence_gate(AlignmentResult::decode_failed(), 0.15);
        assert_eq!(gated.status, AlignmentStatus::DecodeFailed);
        assert_eq!(gated.lag_seconds, 0.0);
    }

    #[test]
    fn align_audio_reports_envelope_sizes() {
        let samples: Vec<f64> = (0..SR as usize)
            .map(|i| if (i / 4800) % 2 == 0 { 0.0 } else { ((i % 7) as f64 - 3.0) / 4.0 })
            .collect();
        let audio = AudioData::new(samples, SR);

        let analysis = align_audio(&audio, &audio, DEFAULT_MIN_CONFIDENCE);
        assert_eq!(analysis.base_envelope_len, 1 + SR as usize / HOP);
        assert_eq!(analysis.overlay_envelope_len, analysis.base_envelope_len);
        assert!(analysis.result.is_aligned());
        assert_eq!(analysis.result.lag_seconds, 0.0);
    }
}
