//! Audio preparation: extraction, loudness normalisation, time shifting.
//!
//! Every operation writes a mono PCM WAV into a working directory and
//! returns its path.

use std::fs;
use std::path::{Path, PathBuf};

use super::runner::{derived_path, require_file, ToolCommand};
use super::types::MediaResult;

/// Shifts shorter than this are applied as a plain copy.
pub const MIN_SHIFT_SECONDS: f64 = 0.001;

const TRUE_PEAK_DB: f64 = -1.5;
const LOUDNESS_RANGE: f64 = 11.0;

/// Decode the audio track of `video` to 16-bit mono WAV.
pub fn extract_audio_command(video: &Path, output: &Path, sample_rate: u32) -> ToolCommand {
    ToolCommand::ffmpeg()
        .input(video)
        .arg("-vn")
        .args(["-acodec", "pcm_s16le"])
        .arg("-ar")
        .arg(sample_rate.to_string())
        .args(["-ac", "1"])
        .arg(output)
}

/// Extract the audio of `video` to `<dir>/<stem>_extracted.wav`.
pub fn extract_audio_to_wav(video: &Path, dir: &Path, sample_rate: u32) -> MediaResult<PathBuf> {
    require_file(video)?;
    fs::create_dir_all(dir)?;

    let output = extracted_audio_path(video, dir);
    extract_audio_command(video, &output, sample_rate).run_to(&output)
}

/// Where [`extract_audio_to_wav`] writes its output.
pub fn extracted_audio_path(video: &Path, dir: &Path) -> PathBuf {
    derived_path(video, dir, "_extracted.wav")
}

/// EBU R128 loudness normalisation to `target_lufs`.
pub fn normalize_loudness_command(
    input: &Path,
    output: &Path,
    target_lufs: f64,
    sample_rate: u32,
) -> ToolCommand {
    ToolCommand::ffmpeg()
        .input(input)
        .arg("-af")
        .arg(loudnorm_filter(target_lufs))
        .arg("-ar")
        .arg(sample_rate.to_string())
        .args(["-ac", "1"])
        .arg(output)
}

/// Normalise `input` to `<dir>/<stem>_normalized.wav`.
pub fn normalize_loudness(
    input: &Path,
    dir: &Path,
    target_lufs: f64,
    sample_rate: u32,
) -> MediaResult<PathBuf> {
    require_file(input)?;
    fs::create_dir_all(dir)?;

    let output = normalized_audio_path(input, dir);
    normalize_loudness_command(input, &output, target_lufs, sample_rate).run_to(&output)
}

/// Where [`normalize_loudness`] writes its output.
pub fn normalized_audio_path(input: &Path, dir: &Path) -> PathBuf {
    derived_path(input, dir, "_normalized.wav")
}

pub(crate) fn loudnorm_filter(target_lufs: f64) -> String {
    format!(
        "loudnorm=I={}:TP={}:LRA={}",
        target_lufs, TRUE_PEAK_DB, LOUDNESS_RANGE
    )
}

/// Where [`time_shift_audio`] writes its output.
pub fn shifted_audio_path(input: &Path, dir: &Path) -> PathBuf {
    derived_path(input, dir, "_shifted.wav")
}

/// Shift audio in time by `shift_seconds`.
///
/// Positive values delay the audio (silence is prepended), negative values
/// advance it (the head is trimmed). Shifts under a millisecond copy the
/// stream unchanged.
pub fn time_shift_command(input: &Path, output: &Path, shift_seconds: f64) -> ToolCommand {
    let cmd = ToolCommand::ffmpeg().input(input);

    if !(shift_seconds.abs() >= MIN_SHIFT_SECONDS) {
        return cmd.args(["-c", "copy"]).arg(output);
    }

    if shift_seconds > 0.0 {
        let delay_ms = (shift_seconds * 1000.0) as i64;
        cmd.arg("-af")
            .arg(format!("adelay={}:all=true", delay_ms))
            .args(["-c:a", "pcm_s16le"])
            .arg(output)
    } else {
        cmd.arg("-ss")
            .arg(shift_seconds.abs().to_string())
            .args(["-c:a", "pcm_s16le"])
            .arg(output)
    }
}

/// Shift `input` by `shift_seconds` into `<dir>/<stem>_shifted.wav`.
pub fn time_shift_audio(input: &Path, dir: &Path, shift_seconds: f64) -> MediaResult<PathBuf> {
    require_file(input)?;
    fs::create_dir_all(dir)?;

    let output = shifted_audio_path(input, dir);
    tracing::info!(
        "Shifting {} by {:+.3}s",
        input.display(),
        shift_seconds
    );
    time_shift_command(input, &output, shift_seconds).run_to(&output)
}
