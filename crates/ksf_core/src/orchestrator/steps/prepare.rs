//! PrepareAudio step - base audio extraction and overlay loudness
//! normalisation.

use crate::media::{
    extract_audio_command, extracted_audio_path, normalize_loudness_command,
    normalized_audio_path,
};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, PrepareOutput, StepOutcome};

use super::run_logged;

/// Writes `<base>_extracted.wav` and `<overlay>_normalized.wav` into the
/// session directory.
pub struct PrepareAudioStep;

impl PrepareAudioStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PrepareAudioStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for PrepareAudioStep {
    fn name(&self) -> &str {
        "PrepareAudio"
    }

    fn description(&self) -> &str {
        "Extract base audio and normalise overlay loudness"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        if ctx.dry_run {
            return Ok(StepOutcome::Skipped("dry run".to_string()));
        }

        let work_dir = ctx.paths.work_dir();
        let alignment = &ctx.settings.alignment;

        std::fs::create_dir_all(work_dir)
            .map_err(|e| StepError::io_error("creating session directory", e))?;

        ctx.logger.stage("Extracting base audio");
        let base_audio = extracted_audio_path(&ctx.inputs.base_video, work_dir);
        let cmd = extract_audio_command(&ctx.inputs.base_video, &base_audio, alignment.sample_rate);
        run_logged(ctx, &cmd, &base_audio)?;

        ctx.logger.stage(&format!(
            "Normalising overlay audio to {} LUFS",
            alignment.target_lufs
        ));
        let overlay_audio = normalized_audio_path(&ctx.inputs.overlay_audio, work_dir);
        let cmd = normalize_loudness_command(
            &ctx.inputs.overlay_audio,
            &overlay_audio,
            alignment.target_lufs,
            alignment.sample_rate,
        );
        run_logged(ctx, &cmd, &overlay_audio)?;

        state.prepare = Some(PrepareOutput {
            base_audio,
            overlay_audio,
        });

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let prepare = state
            .prepare
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Prepared audio not recorded"))?;

        for path in [&prepare.base_audio, &prepare.overlay_audio] {
            if !path.exists() {
                return Err(StepError::file_not_found(path.display().to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::pipeline::tests::test_context;

    #[test]
    fn skipped_in_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path()).with_dry_run(true);
        let mut state = JobState::new("session_test");

        let outcome = PrepareAudioStep::new().execute(&ctx, &mut state).unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped(_)));
        assert!(state.prepare.is_none());
    }
}
