//! Export of source clips to the target aspect ratio.

use std::fs;
use std::path::{Path, PathBuf};

use super::probe::video_dimensions_or;
use super::runner::{derived_path, require_file, ToolCommand};
use super::types::MediaResult;
use crate::config::ExportSettings;
use crate::models::{AspectRatio, QualityProfile};

/// Input and target aspects closer than this only need a scale.
const ASPECT_TOLERANCE: f64 = 0.01;

/// Scale-then-centre-crop filter from `input` to exactly `target` pixels.
///
/// The input is scaled so it covers the target frame, then the overflow
/// on the long side is cropped away.
pub fn build_scale_filter(input: (u32, u32), target: (u32, u32)) -> String {
    let (in_w, in_h) = (input.0.max(1) as u64, input.1.max(1) as u64);
    let (t_w, t_h) = (target.0 as u64, target.1 as u64);

    let input_aspect = in_w as f64 / in_h as f64;
    let target_aspect = t_w as f64 / t_h.max(1) as f64;

    if (input_aspect - target_aspect).abs() < ASPECT_TOLERANCE {
        return format!("scale={}:{}", t_w, t_h);
    }

    let (scale_w, scale_h) = if input_aspect > target_aspect {
        // Wider: match height, crop width
        (t_h * in_w / in_h, t_h)
    } else {
        // Taller: match width, crop height
        (t_w, t_w * in_h / in_w)
    };

    format!("scale={}:{},crop={}:{}", scale_w, scale_h, t_w, t_h)
}

/// `<stem>_<W>x<H>.mp4`.
pub fn export_path(clip: &Path, dir: &Path, ratio: &AspectRatio) -> PathBuf {
    derived_path(clip, dir, &format!("_{}.mp4", ratio.label()))
}

/// Re-encode `input` through `filter` with `profile`.
pub fn export_command(
    input: &Path,
    output: &Path,
    filter: &str,
    profile: &QualityProfile,
) -> ToolCommand {
    let mut cmd = ToolCommand::ffmpeg()
        .input(input)
        .arg("-vf")
        .arg(filter)
        .arg("-c:v")
        .arg(&profile.codec)
        .args(["-c:a", "aac"]);

    if let Some(preset) = &profile.preset {
        cmd = cmd.arg("-preset").arg(preset);
    }
    if let Some(crf) = profile.crf {
        cmd = cmd.arg("-crf").arg(crf.to_string());
    }
    if profile.is_prores() {
        cmd = cmd
            .arg("-profile:v")
            .arg(profile.profile.unwrap_or(3).to_string());
    }

    cmd.arg(output)
}

/// Target frame size for a clip of `input` size under `settings`.
pub fn target_frame_size(input: (u32, u32), settings: &ExportSettings) -> (u32, u32) {
    settings
        .ratio
        .frame_size(settings.height.unwrap_or(input.1))
}

/// Export `clip` into `dir` at the configured ratio and primary profile.
pub fn export_clip(clip: &Path, dir: &Path, settings: &ExportSettings) -> MediaResult<PathBuf> {
    require_file(clip)?;
    fs::create_dir_all(dir)?;

    let input = video_dimensions_or(clip, (1920, 1080));
    let target = target_frame_size(input, settings);
    let filter = build_scale_filter(input, target);
    let output = export_path(clip, dir, &settings.ratio);

    tracing::debug!(
        "Exporting {} to {}x{}",
        clip.display(),
        target.0,
        target.1
    );

    export_command(clip, &output, &filter, &settings.primary_profile()).run_to(&output)
}
