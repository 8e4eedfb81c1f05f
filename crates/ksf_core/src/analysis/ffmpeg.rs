//! FFmpeg audio decoding.
//!
//! Decodes any audio/video file to mono f64 samples at the analysis
//! sample rate by piping raw PCM out of FFmpeg.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::analysis::types::{AnalysisError, AnalysisResult, AudioData};

/// Default sample rate for analysis.
pub const DEFAULT_ANALYSIS_SAMPLE_RATE: u32 = 48000;

/// Decode a media file to mono audio using FFmpeg.
///
/// The audio is downmixed to one channel and resampled to `sample_rate`.
/// A file that decodes to zero samples is reported as an error, which keeps
/// a failed decode distinguishable from valid-but-silent audio.
pub fn decode_audio(input_path: &Path, sample_rate: u32) -> AnalysisResult<AudioData> {
    if !input_path.exists() {
        return Err(AnalysisError::SourceNotFound(
            input_path.display().to_string(),
        ));
    }

    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-v")
        .arg("error")
        .arg("-i")
        .arg(input_path)
        .arg("-vn")
        .arg("-ac")
        .arg("1")
        .arg("-ar")
        .arg(sample_rate.to_string())
        .arg("-f")
        .arg("f64le")
        .arg("-acodec")
        .arg("pcm_f64le")
        .arg("pipe:1");

    cmd.stderr(Stdio::null()).stdout(Stdio::piped());

    tracing::debug!("Running FFmpeg: {:?}", cmd);

    let mut child = cmd
        .spawn()
        .map_err(|e| AnalysisError::FfmpegError(format!("Failed to spawn FFmpeg: {}", e)))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| AnalysisError::FfmpegError("Failed to capture FFmpeg stdout".to_string()))?;

    let mut buffer = Vec::new();
    stdout.read_to_end(&mut buffer).map_err(|e| {
        AnalysisError::FfmpegError(format!("Failed to read FFmpeg output: {}", e))
    })?;

    let status = child
        .wait()
        .map_err(|e| AnalysisError::FfmpegError(format!("FFmpeg process error: {}", e)))?;

    if !status.success() {
        return Err(AnalysisError::FfmpegError(format!(
            "FFmpeg exited with code: {:?}",
            status.code()
        )));
    }

    let samples = bytes_to_f64_samples(&buffer);

    if samples.is_empty() {
        return Err(AnalysisError::ExtractionError(
            "No audio samples decoded".to_string(),
        ));
    }

    tracing::debug!(
        "Decoded {} samples ({:.2}s) from {}",
        samples.len(),
        samples.len() as f64 / sample_rate as f64,
        input_path.display()
    );

    Ok(AudioData::new(samples, sample_rate))
}

/// Get the duration of a media file using FFprobe.
pub fn get_duration(input_path: &Path) -> AnalysisResult<f64> {
    if !input_path.exists() {
        return Err(AnalysisError::SourceNotFound(
            input_path.display().to_string(),
        ));
    }

    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("quiet")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("csv=p=0")
        .arg(input_path)
        .output()
        .map_err(|e| AnalysisError::FfmpegError(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        return Err(AnalysisError::FfmpegError(
            "ffprobe failed to get duration".to_string(),
        ));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(raw: &str) -> AnalysisResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| AnalysisError::FfmpegError(format!("Failed to parse duration: {}", e)))
}

/// Convert raw bytes to f64 samples (little-endian). Trailing partial
/// samples are dropped.
fn bytes_to_f64_samples(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .filter_map(|chunk| <[u8; 8]>::try_from(chunk).ok())
        .map(f64::from_le_bytes)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_to_samples_converts_correctly() {
        let val1: f64 = 0.5;
        let val2: f64 = -0.25;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&val1.to_le_bytes());
        bytes.extend_from_slice(&val2.to_le_bytes());

        let samples = bytes_to_f64_samples(&bytes);

        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.5).abs() < 1e-10);
        assert!((samples[1] - (-0.25)).abs() < 1e-10);
    }

    #[test]
    fn bytes_to_samples_handles_partial() {
        // Only 10 bytes - should get 1 sample (8 bytes), ignore remainder
        let bytes = vec![0u8; 10];
        let samples = bytes_to_f64_samples(&bytes);
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn decode_rejects_missing_file() {
        let result = decode_audio(Path::new("/nonexistent/file.wav"), 48000);
        assert!(matches!(result, Err(AnalysisError::SourceNotFound(_))));
    }

    #[test]
    fn duration_parsing() {
        assert!((parse_duration("123.456\n").unwrap() - 123.456).abs() < 1e-9);
        assert!(parse_duration("N/A").is_err());
    }
}
