//! Hook detection.
//!
//! A hook is a moment in the audio likely to grab attention: a loud,
//! dynamic, voice-like, bright stretch. Hooks are picked from peaks of the
//! energy envelope, scored over a short window, spread out so no two sit
//! within half a clip of each other, and topped up from a uniform grid when
//! the audio does not offer enough peaks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{SlicingError, SlicingResult};
use crate::analysis::{find_peaks, AudioData, SignalExtractor};

/// Minimum peak prominence in the normalised energy envelope.
pub const PEAK_PROMINENCE: f64 = 0.3;
/// Minimum distance between peaks, in envelope frames.
pub const PEAK_DISTANCE_FRAMES: usize = 100;
/// Score given to hooks placed without analysis.
pub const FALLBACK_SCORE: f64 = 0.5;

/// Qualitative rating of a hook score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookRecommendation {
    Strong,
    Good,
    Weak,
    /// The window could not be analysed.
    Unknown,
}

impl HookRecommendation {
    /// Above 0.7 is strong, above 0.5 is good, anything else weak.
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            HookRecommendation::Strong
        } else if score > 0.5 {
            HookRecommendation::Good
        } else {
            HookRecommendation::Weak
        }
    }
}

impl std::fmt::Display for HookRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookRecommendation::Strong => write!(f, "strong"),
            HookRecommendation::Good => write!(f, "good"),
            HookRecommendation::Weak => write!(f, "weak"),
            HookRecommendation::Unknown => write!(f, "unknown"),
        }
    }
}

/// A candidate clip start with its hook rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    /// Position in seconds.
    pub timestamp: f64,
    /// Weighted score in [0, 1].
    pub hook_score: f64,
    /// Per-feature scores; empty when the window was not analysed.
    #[serde(default)]
    pub breakdown: BTreeMap<String, f64>,
    pub recommendation: HookRecommendation,
}

impl Hook {
    /// A hook placed without analysing the audio.
    pub fn unscored(timestamp: f64, hook_score: f64) -> Self {
        Self {
            timestamp,
            hook_score,
            breakdown: BTreeMap::new(),
            recommendation: HookRecommendation::Unknown,
        }
    }
}

/// Accumulates selected hooks while enforcing the spacing rule.
#[derive(Debug, Clone)]
pub struct HookSelection {
    hooks: Vec<Hook>,
    capacity: usize,
    min_spacing: f64,
}

impl HookSelection {
    pub fn new(capacity: usize, min_spacing: f64) -> Self {
        Self {
            hooks: Vec::with_capacity(capacity),
            capacity,
            min_spacing,
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.hooks.len() >= self.capacity
    }

    /// Accept `hook` if there is room and it is at least `min_spacing` from
    /// every selected hook.
    pub fn try_accept(&mut self, hook: Hook) -> bool {
        if self.is_full() {
            return false;
        }
        let too_close = self
            .hooks
            .iter()
            .any(|h| (h.timestamp - hook.timestamp).abs() < self.min_spacing);
        if too_close {
            return false;
        }
        self.hooks.push(hook);
        true
    }

    /// Add a hook without the spacing check.
    pub fn push(&mut self, hook: Hook) {
        self.hooks.push(hook);
    }

    /// Whether a hook sits exactly at `timestamp`.
    pub fn contains_timestamp(&self, timestamp: f64) -> bool {
        self.hooks.iter().any(|h| h.timestamp == timestamp)
    }

    /// Distance from `timestamp` to the nearest selected hook, infinite when
    /// nothing is selected yet.
    pub fn min_distance(&self, timestamp: f64) -> f64 {
        self.hooks
            .iter()
            .map(|h| (timestamp - h.timestamp).abs())
            .fold(f64::INFINITY, f64::min)
    }

    /// Selected hooks in chronological order.
    pub fn into_sorted(mut self) -> Vec<Hook> {
        self.hooks.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        self.hooks
    }
}

/// Finds and scores hooks in an audio track.
pub struct HookFinder {
    extractor: SignalExtractor,
    prominence: f64,
    distance: usize,
}

impl HookFinder {
    pub fn new() -> Self {
        Self {
            extractor: SignalExtractor::new(),
            prominence: PEAK_PROMINENCE,
            distance: PEAK_DISTANCE_FRAMES,
        }
    }

    /// Score the audio between `start` and `start + window` seconds.
    ///
    /// Windows with no usable audio get score 0 and `Unknown`.
    pub fn score_window(&self, audio: &AudioData, timestamp: f64, start: f64, window: f64) -> Hook {
        let samples = audio.window(start, window);

        match self.extractor.hook_features(samples, audio.sample_rate) {
            Some(features) => {
                let scores = features.scores();
                let hook_score = scores.weighted();
                Hook {
                    timestamp,
                    hook_score,
                    breakdown: scores.breakdown(),
                    recommendation: HookRecommendation::from_score(hook_score),
                }
            }
            None => {
                tracing::debug!("No audio to score at {:.2}s", start);
                Hook::unscored(timestamp, 0.0)
            }
        }
    }

    /// Pick up to `num_hooks` hooks over a video of `duration` seconds.
    ///
    /// Silent or unanalysable audio yields `num_hooks` evenly spaced hooks
    /// at `i * duration / (num_hooks + 1)` with the neutral fallback score.
    /// Hooks found from peaks are at least `clip_len / 2` apart; hooks added
    /// from the uniform grid only maximise their distance to the others and
    /// may sit closer.
    pub fn find_hooks(
        &self,
        audio: &AudioData,
        duration: f64,
        clip_len: f64,
        num_hooks: usize,
    ) -> SlicingResult<Vec<Hook>> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SlicingError::InvalidInput(format!(
                "duration must be a non-negative number, got {}",
                duration
            )));
        }
        if !clip_len.is_finite() || clip_len <= 0.0 {
            return Err(SlicingError::InvalidInput(format!(
                "clip length must be positive, got {}",
                clip_len
            )));
        }

        tracing::info!("Finding {} hooks in audio", num_hooks);

        let (envelope, _) = self
            .extractor
            .energy_envelope(&audio.samples, audio.sample_rate);

        if envelope.is_empty() || envelope.values.iter().all(|&v| v == 0.0) {
            tracing::warn!("No usable energy envelope, spacing hooks uniformly");
            return Ok(uniform_hooks(duration, num_hooks));
        }

        // Candidates: energy peaks away from the edges, scored on a window
        // half a clip long starting a quarter clip before the peak.
        let half = clip_len / 2.0;
        let mut candidates: Vec<Hook> = find_peaks(&envelope.values, self.prominence, self.distance)
            .into_iter()
            .map(|frame| envelope.frame_to_time(frame))
            .filter(|&t| half < t && t < duration - half)
            .map(|t| self.score_window(audio, t, t - clip_len / 4.0, half))
            .collect();

        candidates.sort_by(|a, b| b.hook_score.total_cmp(&a.hook_score));

        let mut selection = HookSelection::new(num_hooks, clip_len * 0.5);
        for candidate in candidates {
            if selection.is_full() {
                break;
            }
            selection.try_accept(candidate);
        }

        let from_peaks = selection.len();
        self.backfill(&mut selection, audio, duration, clip_len, num_hooks);

        let hooks = selection.into_sorted();

        let avg = if hooks.is_empty() {
            0.0
        } else {
            hooks.iter().map(|h| h.hook_score).sum::<f64>() / hooks.len() as f64
        };
        tracing::info!(
            "Found {} hooks ({} from peaks, avg score {:.2})",
            hooks.len(),
            from_peaks,
            avg
        );

        Ok(hooks)
    }

    /// Max-min fill from a uniform grid of `floor(duration / clip_len)`
    /// points spanning `[clip_len, duration - clip_len]`.
    fn backfill(
        &self,
        selection: &mut HookSelection,
        audio: &AudioData,
        duration: f64,
        clip_len: f64,
        num_hooks: usize,
    ) {
        let slots = duration / clip_len;
        let grid = linspace(clip_len, duration - clip_len, slots as usize);

        while selection.len() < num_hooks && (selection.len() as f64) < slots {
            let mut best_time = None;
            let mut best_gap = 0.0;

            for &t in &grid {
                if selection.contains_timestamp(t) {
                    continue;
                }
                let gap = selection.min_distance(t);
                if gap > best_gap {
                    best_gap = gap;
                    best_time = Some(t);
                }
            }

            match best_time {
                Some(t) => selection.push(self.score_window(audio, t, t, clip_len / 2.0)),
                None => break,
            }
        }
    }
}

impl Default for HookFinder {
    fn default() -> Self {
        Self::new()
    }
}

/// [`HookFinder::find_hooks`] with default peak settings.
pub fn find_hooks(
    audio: &AudioData,
    duration: f64,
    clip_len: f64,
    num_hooks: usize,
) -> SlicingResult<Vec<Hook>> {
    HookFinder::new().find_hooks(audio, duration, clip_len, num_hooks)
}

/// Pull each window start onto the nearest hook within `attraction_radius`.
///
/// Each start is decided on its own; the first hook wins a tie, and the
/// result may contain duplicates.
pub fn bias_starts_to_hooks(window_starts: &[f64], hooks: &[Hook], attraction_radius: f64) -> Vec<f64> {
    if hooks.is_empty() {
        return window_starts.to_vec();
    }

    window_starts
        .iter()
        .map(|&start| {
            let mut nearest: Option<(f64, f64)> = None;
            for hook in hooks {
                let distance = (hook.timestamp - start).abs();
                if distance >= attraction_radius {
                    continue;
                }
                match nearest {
                    Some((_, best)) if distance >= best => {}
                    _ => nearest = Some((hook.timestamp, distance)),
                }
            }
            nearest.map_or(start, |(timestamp, _)| timestamp)
        })
        .collect()
}

/// `num_hooks` evenly spaced unscored hooks strictly inside the video.
fn uniform_hooks(duration: f64, num_hooks: usize) -> Vec<Hook> {
    let stride = duration / (num_hooks as f64 + 1.0);
    (1..=num_hooks)
        .map(|i| Hook::unscored(i as f64 * stride, FALLBACK_SCORE))
        .collect()
}

/// `num` evenly spaced points from `start` to `stop` inclusive.
fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut points: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
            points[num - 1] = stop;
            points
        }
    }
}
