//! Align step - estimates the overlay audio offset and shifts it.
//!
//! Both prepared audio files are decoded at the configured sample rate,
//! reduced to onset envelopes and cross-correlated. The gated lag is then
//! applied to the normalised overlay audio:
//!
//! - positive lag: the overlay is delayed (silence prepended)
//! - negative lag: the overlay is advanced (start trimmed)
//! - |lag| under 1 ms: the file is copied unchanged
//!
//! A decode failure is not fatal. It is logged, recorded with status
//! `DecodeFailed` and the decoder's error, and leaves the overlay unshifted.

use std::path::Path;

use crate::analysis::{
    decode_audio, AlignmentAnalysis, AlignmentEstimator, AlignmentResult, AnalysisResult,
    AudioData, SignalExtractor,
};
use crate::media::{shifted_audio_path, time_shift_command};
use crate::models::AlignmentRecord;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

use super::run_logged;

pub struct AlignStep;

impl AlignStep {
    pub fn new() -> Self {
        Self
    }

    /// Estimate the offset from decoded audio, or record why decoding failed.
    fn analyze(
        estimator: &AlignmentEstimator,
        extractor: &SignalExtractor,
        decoded: AnalysisResult<(AudioData, AudioData)>,
    ) -> (AlignmentAnalysis, Option<String>) {
        match decoded {
            Ok((base, overlay)) => (estimator.align_audio(extractor, &base, &overlay), None),
            Err(e) => (
                AlignmentAnalysis {
                    result: AlignmentResult::decode_failed(),
                    base_envelope_len: 0,
                    overlay_envelope_len: 0,
                },
                Some(e.to_string()),
            ),
        }
    }

    fn decode_pair(
        base: &Path,
        overlay: &Path,
        sample_rate: u32,
    ) -> AnalysisResult<(AudioData, AudioData)> {
        Ok((
            decode_audio(base, sample_rate)?,
            decode_audio(overlay, sample_rate)?,
        ))
    }
}

impl Default for AlignStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for AlignStep {
    fn name(&self) -> &str {
        "Align"
    }

    fn description(&self) -> &str {
        "Cross-correlate onset envelopes and shift the overlay audio"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        if ctx.dry_run {
            return Ok(StepOutcome::Skipped("dry run".to_string()));
        }

        let prepare = state
            .prepare
            .as_ref()
            .ok_or_else(|| StepError::precondition_failed("Audio has not been prepared"))?;

        let settings = &ctx.settings.alignment;
        let extractor = SignalExtractor::new()
            .with_n_fft(settings.n_fft)
            .with_hop_length(settings.hop_length);
        let estimator = AlignmentEstimator::new().with_min_confidence(settings.min_conf);

        ctx.logger.stage("Estimating overlay offset");
        let decoded = Self::decode_pair(
            &prepare.base_audio,
            &prepare.overlay_audio,
            settings.sample_rate,
        );
        if let Ok((base, overlay)) = &decoded {
            ctx.logger.info(&format!(
                "Decoded {:.2}s base and {:.2}s overlay at {} Hz",
                base.duration_secs, overlay.duration_secs, settings.sample_rate
            ));
        }
        let (analysis, decode_error) = Self::analyze(&estimator, &extractor, decoded);
        if let Some(e) = &decode_error {
            ctx.logger
                .warn(&format!("Audio decode failed, leaving overlay unshifted: {}", e));
        }

        let result = analysis.result;
        ctx.logger.info(&format!(
            "Alignment: {} (lag {:+.4}s, confidence {:.4}, envelopes {}/{})",
            result.status,
            result.lag_seconds,
            result.confidence,
            analysis.base_envelope_len,
            analysis.overlay_envelope_len
        ));

        let shifted = shifted_audio_path(&prepare.overlay_audio, ctx.paths.work_dir());
        let cmd = time_shift_command(&prepare.overlay_audio, &shifted, result.lag_seconds);
        run_logged(ctx, &cmd, &shifted)?;

        let mut record = AlignmentRecord::from_analysis(&analysis, Some(shifted));
        if let Some(e) = decode_error {
            record = record.with_error(e);
        }
        state.alignment = Some(record);

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let alignment = state
            .alignment
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Alignment not recorded"))?;

        match &alignment.shifted_audio_path {
            Some(path) if path.exists() => Ok(()),
            Some(path) => Err(StepError::file_not_found(path.display().to_string())),
            None => Err(StepError::invalid_output("Shifted audio path missing")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AlignmentStatus, AnalysisError};
    use crate::orchestrator::pipeline::tests::test_context;

    #[test]
    fn skipped_in_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path()).with_dry_run(true);
        let mut state = JobState::new("session_test");

        let outcome = AlignStep::new().execute(&ctx, &mut state).unwrap();
        assert_eq!(outcome, StepOutcome::Skipped("dry run".to_string()));
        assert!(state.alignment.is_none());
    }

    #[test]
    fn decode_failure_is_not_silence() {
        let failed = AlignStep::analyze(
            &AlignmentEstimator::new(),
            &SignalExtractor::new(),
            Err(AnalysisError::FfmpegError("ffmpeg exited with status 1".to_string())),
        );
        assert_eq!(failed.0.result.status, AlignmentStatus::DecodeFailed);
        assert_eq!(failed.0.result.lag_seconds, 0.0);
        assert!(failed.1.unwrap().contains("status 1"));

        let silent = AudioData::new(vec![0.0; 48_000], 48_000);
        let (analysis, error) = AlignStep::analyze(
            &AlignmentEstimator::new(),
            &SignalExtractor::new(),
            Ok((silent.clone(), silent)),
        );
        assert_ne!(analysis.result.status, AlignmentStatus::DecodeFailed);
        assert!(error.is_none());

        let record = AlignmentRecord::from_analysis(&failed.0, None).with_error("bad input");
        assert_eq!(record.status, AlignmentStatus::DecodeFailed);
        assert_eq!(record.error.as_deref(), Some("bad input"));
    }

    #[test]
    fn requires_prepared_audio() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = JobState::new("session_test");

        let err = AlignStep::new().execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, StepError::PreconditionFailed(_)));
    }
}
