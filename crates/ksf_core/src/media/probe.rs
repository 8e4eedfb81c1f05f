//! File probing using `ffprobe -print_format json`.

use std::path::Path;

use serde_json::Value;

use super::runner::{require_file, ToolCommand};
use super::types::{MediaError, MediaInfo, MediaKind, MediaResult};

/// Overlay audio longer than this multiple of the base is suspicious.
const DURATION_RATIO_WARNING: f64 = 1.5;
/// Sample rates further apart than this (Hz) are worth a warning.
const SAMPLE_RATE_TOLERANCE: u32 = 1000;
const ASSUMED_SAMPLE_RATE: u32 = 48000;

/// Check that all three session inputs exist.
pub fn validate_inputs(
    base_video: &Path,
    overlay_video: &Path,
    overlay_audio: &Path,
) -> MediaResult<()> {
    require_file(base_video)?;
    require_file(overlay_video)?;
    require_file(overlay_audio)?;
    Ok(())
}

/// Probe a media file for its streams and duration.
pub fn probe_media(path: &Path) -> MediaResult<MediaInfo> {
    require_file(path)?;

    tracing::debug!("Probing file: {}", path.display());

    let output = ToolCommand::ffprobe()
        .args(["-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .run()?;

    let json: Value = serde_json::from_slice(&output.stdout).map_err(|e| MediaError::ParseError {
        tool: "ffprobe".to_string(),
        message: e.to_string(),
    })?;

    Ok(parse_probe_json(&json, path))
}

/// Frame size of the first video stream.
pub fn video_dimensions(path: &Path) -> MediaResult<(u32, u32)> {
    let info = probe_media(path)?;
    info.dimensions().ok_or_else(|| MediaError::ParseError {
        tool: "ffprobe".to_string(),
        message: format!("no video dimensions in {}", path.display()),
    })
}

/// Frame size of the first video stream, or `fallback` if it can't be read.
pub fn video_dimensions_or(path: &Path, fallback: (u32, u32)) -> (u32, u32) {
    match video_dimensions(path) {
        Ok(dims) => dims,
        Err(e) => {
            tracing::warn!(
                "Could not read dimensions of {} ({}), assuming {}x{}",
                path.display(),
                e,
                fallback.0,
                fallback.1
            );
            fallback
        }
    }
}

/// Check that base and overlay audio can be aligned.
///
/// Missing durations are errors. Returns human-readable warnings for
/// suspicious but workable combinations.
pub fn validate_media_compatibility(
    base: &MediaInfo,
    overlay: &MediaInfo,
) -> MediaResult<Vec<String>> {
    if !(base.duration > 0.0) {
        return Err(MediaError::Incompatible(format!(
            "base video {} has no duration",
            base.path.display()
        )));
    }
    if !(overlay.duration > 0.0) {
        return Err(MediaError::Incompatible(format!(
            "overlay audio {} has no duration",
            overlay.path.display()
        )));
    }

    let mut warnings = Vec::new();

    if overlay.duration > base.duration * DURATION_RATIO_WARNING {
        warnings.push(format!(
            "Overlay audio ({:.2}s) is significantly longer than base video ({:.2}s)",
            overlay.duration, base.duration
        ));
    }

    let base_sr = base.sample_rate.unwrap_or(ASSUMED_SAMPLE_RATE);
    let overlay_sr = overlay.sample_rate.unwrap_or(ASSUMED_SAMPLE_RATE);
    if base_sr.abs_diff(overlay_sr) > SAMPLE_RATE_TOLERANCE {
        warnings.push(format!(
            "Sample rate mismatch - base: {}Hz, overlay: {}Hz",
            base_sr, overlay_sr
        ));
    }

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    Ok(warnings)
}

/// Build [`MediaInfo`] from ffprobe JSON.
///
/// Cover art (attached picture streams) does not make a file a video.
pub(crate) fn parse_probe_json(json: &Value, path: &Path) -> MediaInfo {
    let streams: Vec<&Value> = json
        .get("streams")
        .and_then(|s| s.as_array())
        .map(|a| a.iter().collect())
        .unwrap_or_default();

    let video = streams
        .iter()
        .find(|s| is_stream_type(s, "video") && !is_cover_art(s))
        .copied();
    let audio = streams
        .iter()
        .find(|s| is_stream_type(s, "audio"))
        .copied();

    let kind = match (video, audio) {
        (Some(_), _) => MediaKind::Video,
        (None, Some(_)) => MediaKind::Audio,
        (None, None) => MediaKind::Unknown,
    };

    let duration = json
        .get("format")
        .and_then(|f| f.get("duration"))
        .and_then(number_or_string)
        .unwrap_or(0.0);

    let str_field = |s: Option<&Value>, key: &str| {
        s.and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
    };
    let u32_field = |s: Option<&Value>, key: &str| {
        s.and_then(|v| v.get(key))
            .and_then(number_or_string)
            .filter(|v| *v >= 0.0)
            .map(|v| v as u32)
    };

    MediaInfo {
        path: path.to_path_buf(),
        kind,
        duration,
        fps: video
            .and_then(|v| v.get("r_frame_rate"))
            .and_then(|r| r.as_str())
            .and_then(parse_frame_rate),
        width: u32_field(video, "width"),
        height: u32_field(video, "height"),
        video_codec: str_field(video, "codec_name"),
        audio_codec: str_field(audio, "codec_name"),
        sample_rate: u32_field(audio, "sample_rate"),
        channels: u32_field(audio, "channels"),
    }
}

/// Parse ffprobe's `num/den` frame rate. `0/0` and the like give `None`.
pub(crate) fn parse_frame_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

fn is_stream_type(stream: &Value, kind: &str) -> bool {
    stream.get("codec_type").and_then(|t| t.as_str()) == Some(kind)
}

fn is_cover_art(stream: &Value) -> bool {
    stream
        .get("disposition")
        .and_then(|d| d.get("attached_pic"))
        .and_then(|a| a.as_i64())
        == Some(1)
}

/// ffprobe prints most numbers as strings.
fn number_or_string(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
