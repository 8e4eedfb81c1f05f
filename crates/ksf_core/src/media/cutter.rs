//! Cutting the composited master into source clips.

use std::fs;
use std::path::{Path, PathBuf};

use super::runner::{require_file, ToolCommand};
use super::types::MediaResult;

/// Clips smaller than this are leftovers of failed cuts.
const MIN_CLIP_BYTES: u64 = 1024;

/// `clip_<index>_<start>_<end>.mp4`, times in whole seconds.
///
/// `index` is the clip's position in the plan. Plans may repeat a start, or
/// hold starts within the same second, so the index keeps names unique.
pub fn clip_file_name(index: usize, start: f64, end: f64) -> String {
    format!("clip_{:03}_{:06}_{:06}.mp4", index, start as i64, end as i64)
}

/// Stream-copy `[start, end)` of `video` into `output`.
pub fn cut_clip_command(video: &Path, output: &Path, start: f64, end: f64) -> ToolCommand {
    ToolCommand::ffmpeg()
        .input(video)
        .arg("-ss")
        .arg(start.to_string())
        .arg("-to")
        .arg(end.to_string())
        .args(["-c", "copy"])
        .args(["-avoid_negative_ts", "make_zero"])
        .arg(output)
}

/// Cut plan entry `index`, a `clip_len` second clip starting at `start`, into `dir`.
pub fn cut_clip(
    video: &Path,
    dir: &Path,
    index: usize,
    start: f64,
    clip_len: f64,
) -> MediaResult<PathBuf> {
    require_file(video)?;
    fs::create_dir_all(dir)?;

    let end = start + clip_len;
    let output = dir.join(clip_file_name(index, start, end));

    tracing::debug!("Cutting clip {:.2}s to {:.2}s", start, end);
    cut_clip_command(video, &output, start, end).run_to(&output)
}

/// Remove `clip_*.mp4` files under 1 KiB from `dir`.
///
/// Returns the number of files removed. A missing directory is not an error.
pub fn cleanup_failed_clips(dir: &Path) -> MediaResult<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_clip = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .is_some_and(|n| n.starts_with("clip_") && n.ends_with(".mp4"));
        if !is_clip {
            continue;
        }

        if fs::metadata(&path)?.len() < MIN_CLIP_BYTES {
            tracing::info!("Removing incomplete clip: {}", path.display());
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }

    Ok(removed)
}
