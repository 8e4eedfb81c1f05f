//! Video assembly: audio replacement and overlay compositing.

use std::fs;
use std::path::{Path, PathBuf};

use super::probe::video_dimensions_or;
use super::runner::{require_file, ToolCommand};
use super::types::MediaResult;
use crate::config::OverlaySettings;

/// Assumed base frame size when probing fails.
pub const FALLBACK_BASE_SIZE: (u32, u32) = (1920, 1080);
/// Assumed overlay frame size when probing fails.
pub const FALLBACK_OVERLAY_SIZE: (u32, u32) = (480, 360);

/// Keep the video of `video`, take the audio of `audio`, stop at the
/// shorter of the two.
pub fn replace_audio_command(video: &Path, audio: &Path, output: &Path) -> ToolCommand {
    ToolCommand::ffmpeg()
        .input(video)
        .input(audio)
        .args(["-map", "0:v", "-map", "1:a"])
        .args(["-c:v", "copy", "-c:a", "aac"])
        .arg("-shortest")
        .arg(output)
}

pub fn replace_audio(video: &Path, audio: &Path, output: &Path) -> MediaResult<PathBuf> {
    require_file(video)?;
    require_file(audio)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    replace_audio_command(video, audio, output).run_to(output)
}

/// Filter graph placing input 1 over input 0 at `(x, y)` with `opacity`.
pub fn overlay_filter(x: i64, y: i64, opacity: f64) -> String {
    format!(
        "[1:v]format=rgba,colorchannelmixer=aa={}[overlay];[0:v][overlay]overlay={}:{}[v]",
        opacity.clamp(0.0, 1.0),
        x,
        y
    )
}

/// Composite `overlay` onto `base`, keeping the base audio.
pub fn composite_command(
    base: &Path,
    overlay: &Path,
    output: &Path,
    position: (i64, i64),
    opacity: f64,
) -> ToolCommand {
    ToolCommand::ffmpeg()
        .input(base)
        .input(overlay)
        .arg("-filter_complex")
        .arg(overlay_filter(position.0, position.1, opacity))
        .args(["-map", "[v]", "-map", "0:a?"])
        .args(["-c:v", "libx264", "-preset", "veryfast", "-crf", "20"])
        .args(["-c:a", "copy"])
        .arg(output)
}

/// Composite the overlay video onto the base per `settings`.
///
/// Frame sizes are probed; unreadable sizes fall back to
/// [`FALLBACK_BASE_SIZE`] and [`FALLBACK_OVERLAY_SIZE`].
pub fn composite_overlay(
    base: &Path,
    overlay: &Path,
    output: &Path,
    settings: &OverlaySettings,
) -> MediaResult<PathBuf> {
    composite_overlay_command(base, overlay, output, settings)?.run_to(output)
}

/// Probe both inputs and build the composite command without running it.
pub fn composite_overlay_command(
    base: &Path,
    overlay: &Path,
    output: &Path,
    settings: &OverlaySettings,
) -> MediaResult<ToolCommand> {
    require_file(base)?;
    require_file(overlay)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let base_size = video_dimensions_or(base, FALLBACK_BASE_SIZE);
    let overlay_size = video_dimensions_or(overlay, FALLBACK_OVERLAY_SIZE);
    let position = settings
        .position
        .coordinates(base_size, overlay_size, settings.margin_px);

    tracing::info!(
        "Compositing {}x{} overlay at ({}, {}) with {} opacity",
        overlay_size.0,
        overlay_size.1,
        position.0,
        position.1,
        settings.opacity
    );

    Ok(composite_command(base, overlay, output, position, settings.opacity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_audio_maps_streams() {
        let cmd = replace_audio_command(Path::new("b.mp4"), Path::new("a.wav"), Path::new("o.mp4"));
        let args = cmd.arg_strings();
        let joined = args.join(" ");
        assert!(joined.contains("-i b.mp4 -i a.wav -map 0:v -map 1:a -c:v copy -c:a aac -shortest o.mp4"));
    }

    #[test]
    fn overlay_filter_graph() {
        assert_eq!(
            overlay_filter(1416, 24, 0.9),
            "[1:v]format=rgba,colorchannelmixer=aa=0.9[overlay];[0:v][overlay]overlay=1416:24[v]"
        );
        // Opacity is clamped into range
        assert!(overlay_filter(0, 0, 1.7).contains("aa=1[overlay]"));
    }

    #[test]
    fn composite_keeps_base_audio() {
        let cmd = composite_command(
            Path::new("b.mp4"),
            Path::new("o.mp4"),
            Path::new("m.mp4"),
            (10, 20),
            0.5,
        );
        let args = cmd.arg_strings();
        let map_idx = args.iter().position(|a| a == "[v]").unwrap();
        assert_eq!(args[map_idx + 1], "-map");
        assert_eq!(args[map_idx + 2], "0:a?");
        assert_eq!(args.last().unwrap(), "m.mp4");
        assert!(args.iter().any(|a| a.ends_with("overlay=10:20[v]")));
    }
}
