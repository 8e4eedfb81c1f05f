//! Deterministic synthetic signals shared by the analysis and slicing tests.

use std::f64::consts::PI;

/// Pseudo-random values in `[-0.5, 0.5)`, reproducible per `seed`.
pub fn noise(len: usize, seed: u64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
        })
        .collect()
}

/// `secs` seconds of a sine tone at `freq` Hz.
pub fn sine(freq: f64, secs: f64, amp: f64, sample_rate: u32) -> Vec<f64> {
    let n = (secs * sample_rate as f64) as usize;
    (0..n)
        .map(|i| amp * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin())
        .collect()
}

/// Zeros with a single 1.0 at `at`.
pub fn impulse(len: usize, at: usize) -> Vec<f64> {
    let mut x = vec![0.0; len];
    x[at] = 1.0;
    x
}

/// Silence with `burst_len` samples of alternating `±amp` at each offset.
pub fn square_bursts(len: usize, at: &[usize], burst_len: usize, amp: f64) -> Vec<f64> {
    let mut signal = vec![0.0; len];
    for &pos in at {
        for k in 0..burst_len.min(len.saturating_sub(pos)) {
            signal[pos + k] = if k % 2 == 0 { amp } else { -amp };
        }
    }
    signal
}

#[test]
fn noise_is_reproducible_and_bounded() {
    let a = noise(1000, 5);
    assert_eq!(a, noise(1000, 5));
    assert_ne!(a, noise(1000, 6));
    assert!(a.iter().all(|x| (-0.5..0.5).contains(x)));
}
