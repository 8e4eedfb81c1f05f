//! Composite step - muxes the shifted audio and overlays the face video.

use crate::analysis::get_duration;
use crate::media::{composite_overlay_command, replace_audio_command};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{CompositeOutput, Context, JobState, StepOutcome};

use super::run_logged;

const VIDEO_WITH_AUDIO: &str = "video_with_audio.mp4";
const MASTER: &str = "master.mp4";

/// Produces `video_with_audio.mp4` (base video, shifted overlay audio)
/// and `master.mp4` (that plus the overlay video) in the session directory.
pub struct CompositeStep;

impl CompositeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CompositeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for CompositeStep {
    fn name(&self) -> &str {
        "Composite"
    }

    fn description(&self) -> &str {
        "Replace base audio and composite the overlay video"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        if ctx.dry_run {
            return Ok(StepOutcome::Skipped("dry run".to_string()));
        }

        let shifted_audio = state
            .alignment
            .as_ref()
            .and_then(|a| a.shifted_audio_path.clone())
            .ok_or_else(|| StepError::precondition_failed("No shifted overlay audio"))?;

        let work_dir = ctx.paths.work_dir();

        ctx.logger.stage("Replacing base audio");
        let video_with_audio = work_dir.join(VIDEO_WITH_AUDIO);
        let cmd = replace_audio_command(&ctx.inputs.base_video, &shifted_audio, &video_with_audio);
        run_logged(ctx, &cmd, &video_with_audio)?;

        ctx.logger.stage("Compositing overlay video");
        let overlay = &ctx.settings.overlay;
        ctx.logger.info(&format!(
            "Position {}, opacity {}, margin {}px",
            overlay.position, overlay.opacity, overlay.margin_px
        ));
        let master = work_dir.join(MASTER);
        let cmd = composite_overlay_command(
            &video_with_audio,
            &ctx.inputs.overlay_video,
            &master,
            overlay,
        )?;
        run_logged(ctx, &cmd, &master)?;

        let duration = match get_duration(&master) {
            Ok(d) if d > 0.0 => d,
            result => {
                let fallback = state.media.as_ref().map(|m| m.base.duration).unwrap_or(0.0);
                if let Err(e) = result {
                    ctx.logger.warn(&format!(
                        "Could not read master duration, using base duration: {}",
                        e
                    ));
                }
                fallback
            }
        };
        ctx.logger
            .info(&format!("Master: {} ({:.2}s)", master.display(), duration));

        state.composite = Some(CompositeOutput {
            video_with_audio,
            master,
            duration,
        });

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let composite = state
            .composite
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Composite output not recorded"))?;

        if !composite.master.exists() {
            return Err(StepError::file_not_found(
                composite.master.display().to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::pipeline::tests::test_context;
    use crate::orchestrator::steps::test_support::no_signal_record;

    #[test]
    fn skipped_in_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path()).with_dry_run(true);
        let mut state = JobState::new("session_test");

        let outcome = CompositeStep::new().execute(&ctx, &mut state).unwrap();
        assert!(matches!(outcome, StepOutcome::Skipped(_)));
    }

    #[test]
    fn requires_shifted_audio() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = JobState::new("session_test");
        state.alignment = Some(no_signal_record());

        let err = CompositeStep::new().execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, StepError::PreconditionFailed(_)));
    }
}
