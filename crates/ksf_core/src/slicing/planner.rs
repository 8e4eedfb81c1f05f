//! Clip start planning.
//!
//! Combines the three window strategies in a fixed order: uniform windows,
//! then scene snapping, then hook biasing. Each intermediate list is kept
//! so the session manifest can show how the final starts came about.

use serde::{Deserialize, Serialize};

use super::hooks::{bias_starts_to_hooks, Hook, HookFinder};
use super::scenes::merge_scene_boundaries;
use super::windows::generate_starts;
use super::SlicingResult;
use crate::analysis::AudioData;
use crate::config::SlicingSettings;

/// Every stage of a clip-start plan.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClipPlan {
    /// Clip length in seconds.
    pub clip_len: f64,
    /// Fixed-stride window starts.
    pub uniform_starts: Vec<f64>,
    /// Scene boundaries used for snapping (empty when disabled).
    pub scene_boundaries: Vec<f64>,
    /// Hooks used for biasing (empty when disabled).
    pub hooks: Vec<Hook>,
    /// Final clip starts, in cut order.
    pub clip_starts: Vec<f64>,
}

impl ClipPlan {
    pub fn len(&self) -> usize {
        self.clip_starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clip_starts.is_empty()
    }

    /// `(start, end)` of each planned clip.
    pub fn windows(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.clip_starts.iter().map(move |&s| (s, s + self.clip_len))
    }
}

/// Plan clip starts for a video of `duration` seconds.
///
/// `scenes` are only used when scene detection is enabled and `audio` only
/// when hook detection is. Missing audio with hook detection on falls back
/// to uniform hooks. `max_clips` caps the plan whether or not scenes are
/// used.
pub fn plan_clip_starts(
    duration: f64,
    audio: Option<&AudioData>,
    scenes: &[f64],
    settings: &SlicingSettings,
) -> SlicingResult<ClipPlan> {
    let clip_len = settings.clip_len;
    let uniform_starts = generate_starts(duration, clip_len, settings.stride)?;

    let scene_boundaries = if settings.scene_detect {
        scenes.to_vec()
    } else {
        Vec::new()
    };

    let mut clip_starts = merge_scene_boundaries(
        &scene_boundaries,
        &uniform_starts,
        clip_len,
        settings.max_clips,
    );

    let hooks = if settings.hook_detect {
        let silent = AudioData::new(Vec::new(), 0);
        let audio = audio.unwrap_or(&silent);
        HookFinder::new().find_hooks(audio, duration, clip_len, settings.num_hooks)?
    } else {
        Vec::new()
    };

    if !hooks.is_empty() {
        clip_starts = bias_starts_to_hooks(&clip_starts, &hooks, settings.attraction_radius);
    }

    tracing::info!(
        "Planned {} clips ({} uniform, {} scene boundaries, {} hooks)",
        clip_starts.len(),
        uniform_starts.len(),
        scene_boundaries.len(),
        hooks.len()
    );

    Ok(ClipPlan {
        clip_len,
        uniform_starts,
        scene_boundaries,
        hooks,
        clip_starts,
    })
}
