//! Validate step - checks that the inputs exist and can be aligned.

use crate::media::{probe_media, validate_inputs, validate_media_compatibility};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, MediaOutput, StepOutcome};

/// Probes the base video and overlay audio.
///
/// Runs in dry runs too; the plan needs the base video's duration.
pub struct ValidateStep;

impl ValidateStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ValidateStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ValidateStep {
    fn name(&self) -> &str {
        "Validate"
    }

    fn description(&self) -> &str {
        "Check inputs and probe media"
    }

    fn validate_input(&self, ctx: &Context) -> StepResult<()> {
        let inputs = &ctx.inputs;
        validate_inputs(
            &inputs.base_video,
            &inputs.overlay_video,
            &inputs.overlay_audio,
        )?;
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        ctx.logger.info(&format!(
            "Base video: {}",
            ctx.inputs.base_video.display()
        ));
        ctx.logger.info(&format!(
            "Overlay video: {}",
            ctx.inputs.overlay_video.display()
        ));
        ctx.logger.info(&format!(
            "Overlay audio: {}",
            ctx.inputs.overlay_audio.display()
        ));

        let base = probe_media(&ctx.inputs.base_video)?;
        let overlay_audio = probe_media(&ctx.inputs.overlay_audio)?;

        if let Some((w, h)) = base.dimensions() {
            ctx.logger.info(&format!(
                "Base: {}x{}, {:.2}s",
                w, h, base.duration
            ));
        }
        ctx.logger
            .info(&format!("Overlay audio: {:.2}s", overlay_audio.duration));

        let warnings = validate_media_compatibility(&base, &overlay_audio)?;
        for warning in &warnings {
            ctx.logger.warn(warning);
        }

        state.media = Some(MediaOutput {
            base,
            overlay_audio,
            warnings,
        });

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let media = state
            .media
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Media info not recorded"))?;

        if !media.base.has_video() {
            return Err(StepError::invalid_output(format!(
                "Base input {} has no video stream",
                media.base.path.display()
            )));
        }
        if !media.overlay_audio.has_audio() {
            return Err(StepError::invalid_output(format!(
                "Overlay audio {} has no audio stream",
                media.overlay_audio.path.display()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::pipeline::tests::test_context;

    #[test]
    fn missing_inputs_fail_before_probing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());

        let err = ValidateStep::new().validate_input(&ctx).unwrap_err();
        assert!(matches!(err, StepError::FileNotFound { ref path } if path.ends_with("base.mp4")));
    }

    #[test]
    fn missing_overlay_audio_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.mp4"), b"video").unwrap();
        std::fs::write(dir.path().join("face.mp4"), b"video").unwrap();
        let ctx = test_context(dir.path());

        let err = ValidateStep::new().validate_input(&ctx).unwrap_err();
        assert!(matches!(err, StepError::FileNotFound { ref path } if path.ends_with("voice.wav")));
    }

    #[test]
    fn output_requires_recorded_media() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let state = JobState::new("session_test");

        assert!(ValidateStep::new().validate_output(&ctx, &state).is_err());
    }
}
