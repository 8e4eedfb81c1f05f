//! Clip window selection.
//!
//! - `windows`: fixed-stride window starts
//! - `scenes`: keyframe scene boundaries and snapping windows onto them
//! - `hooks`: energy-peak hooks and biasing windows toward them
//! - `planner`: runs the three in order for one video

mod hooks;
mod planner;
mod scenes;
mod windows;

pub use hooks::{
    bias_starts_to_hooks, find_hooks, Hook, HookFinder, HookRecommendation, HookSelection,
    FALLBACK_SCORE, PEAK_DISTANCE_FRAMES, PEAK_PROMINENCE,
};
pub use planner::{plan_clip_starts, ClipPlan};
pub use scenes::{
    detect_scenes, filter_scenes_by_min_length, merge_scene_boundaries, parse_keyframe_packets,
    scene_spans, SceneSpan,
};
pub use windows::generate_starts;

/// Errors from clip planning.
#[derive(Debug, thiserror::Error)]
pub enum SlicingError {
    /// Malformed numeric input (negative duration, non-positive stride).
    #[error("Invalid slicing input: {0}")]
    InvalidInput(String),

    /// Scene detection could not run.
    #[error("Scene detection failed: {0}")]
    SceneDetection(String),
}

/// Type alias for slicing results.
pub type SlicingResult<T> = Result<T, SlicingError>;
