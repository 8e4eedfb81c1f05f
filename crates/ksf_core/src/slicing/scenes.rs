//! Scene boundary detection and snapping.
//!
//! Scene boundaries come from the video's keyframe packets (encoders place
//! keyframes on hard cuts). Window starts are then nudged onto a nearby
//! boundary so clips open on a cut instead of mid-shot.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

use super::{SlicingError, SlicingResult};

/// Substitute a boundary only when it is closer than this fraction of a clip.
const SNAP_FRACTION: f64 = 0.3;
/// Boundaries are only considered within this fraction of a clip either side.
const SEARCH_FRACTION: f64 = 0.5;

/// One scene between two boundaries. The last scene is open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSpan {
    pub index: usize,
    pub start: f64,
    pub end: Option<f64>,
    pub duration: Option<f64>,
}

/// Detect scene boundaries from keyframe packet timestamps.
///
/// Runs ffprobe over the first video stream and keeps packets flagged as
/// keyframes, then drops boundaries closer than `min_scene_len` to the
/// previously kept one.
pub fn detect_scenes(video_path: &Path, min_scene_len: f64) -> SlicingResult<Vec<f64>> {
    if !video_path.exists() {
        return Err(SlicingError::SceneDetection(format!(
            "video not found: {}",
            video_path.display()
        )));
    }

    tracing::info!(
        "Detecting scenes in {}",
        video_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    );

    let output = Command::new("ffprobe")
        .args(["-v", "quiet"])
        .args(["-show_entries", "packet=pts_time,flags"])
        .args(["-select_streams", "v:0"])
        .args(["-of", "csv=p=0"])
        .arg(video_path)
        .output()
        .map_err(|e| SlicingError::SceneDetection(format!("failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(SlicingError::SceneDetection(format!(
            "ffprobe exited with code {:?}",
            output.status.code()
        )));
    }

    let keyframes = parse_keyframe_packets(&String::from_utf8_lossy(&output.stdout));
    let scenes = filter_scenes_by_min_length(&keyframes, min_scene_len);

    tracing::info!("Found {} scene changes", scenes.len());

    Ok(scenes)
}

/// Parse `pts_time,flags` CSV lines, keeping keyframe timestamps.
///
/// Unparseable lines are skipped. The result is sorted ascending.
pub fn parse_keyframe_packets(csv: &str) -> Vec<f64> {
    let mut times: Vec<f64> = csv
        .lines()
        .filter_map(|line| {
            let mut parts = line.trim().split(',');
            let time = parts.next()?.trim().parse::<f64>().ok()?;
            let flags = parts.next()?;
            (flags.contains('K') && time.is_finite()).then_some(time)
        })
        .collect();

    times.sort_by(f64::total_cmp);
    times
}

/// Keep the first boundary, then each boundary at least `min_length` after
/// the last kept one.
pub fn filter_scenes_by_min_length(scene_times: &[f64], min_length: f64) -> Vec<f64> {
    let mut filtered: Vec<f64> = Vec::with_capacity(scene_times.len());

    for &time in scene_times {
        match filtered.last() {
            Some(&last) if time - last < min_length => {}
            _ => filtered.push(time),
        }
    }

    filtered
}

/// Start, end and duration of each scene.
pub fn scene_spans(scene_times: &[f64]) -> Vec<SceneSpan> {
    scene_times
        .iter()
        .enumerate()
        .map(|(index, &start)| {
            let end = scene_times.get(index + 1).copied();
            SceneSpan {
                index,
                start,
                end,
                duration: end.map(|e| e - start),
            }
        })
        .collect()
}

/// Snap window starts onto nearby scene boundaries.
///
/// Both inputs must be ascending. A single forward pointer walks the
/// boundaries: boundaries earlier than `start - clip_len/2` are skipped for
/// good, boundaries within `clip_len/2` of the start are consumed while
/// looking for the closest one, and the scan stops at the first boundary
/// past `start + clip_len/2`. The closest boundary replaces the start only
/// when it is nearer than `0.3 * clip_len`.
///
/// Output has one entry per window start, truncated to `max_clips`.
pub fn merge_scene_boundaries(
    scenes: &[f64],
    window_starts: &[f64],
    clip_len: f64,
    max_clips: Option<usize>,
) -> Vec<f64> {
    let limit = max_clips.unwrap_or(usize::MAX);

    if scenes.is_empty() {
        return window_starts.iter().copied().take(limit).collect();
    }

    let reach = clip_len * SEARCH_FRACTION;
    let snap = clip_len * SNAP_FRACTION;

    let mut merged = Vec::with_capacity(window_starts.len().min(limit));
    let mut scene_idx = 0;
    let mut snapped = 0;

    for &window_start in window_starts {
        if merged.len() >= limit {
            break;
        }

        let mut nearest: Option<f64> = None;
        let mut best_distance = f64::INFINITY;

        while let Some(&scene) = scenes.get(scene_idx) {
            if scene < window_start - reach {
                scene_idx += 1;
                continue;
            }
            if scene > window_start + reach {
                break;
            }

            let distance = (scene - window_start).abs();
            if distance < best_distance {
                best_distance = distance;
                nearest = Some(scene);
            }
            scene_idx += 1;
        }

        match nearest {
            Some(scene) if best_distance < snap => {
                merged.push(scene);
                snapped += 1;
            }
            _ => merged.push(window_start),
        }
    }

    tracing::debug!(
        "Scene snapping: {} of {} windows moved to a boundary",
        snapped,
        merged.len()
    );

    merged
}
