//! Export step - scales and crops each clip to the target aspect ratio.

use crate::media::{
    build_scale_filter, export_command, export_path, target_frame_size, video_dimensions_or,
    FALLBACK_BASE_SIZE,
};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, ProducedFiles, StepOutcome};

use super::run_logged;

/// Encodes `exports/<W>x<H>/<clip>_<W>x<H>.mp4` with the first quality
/// profile of the ladder.
pub struct ExportStep;

impl ExportStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExportStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ExportStep {
    fn name(&self) -> &str {
        "Export"
    }

    fn description(&self) -> &str {
        "Export clips to the target aspect ratio"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        if ctx.dry_run {
            return Ok(StepOutcome::Skipped("dry run".to_string()));
        }

        let clips = match state.clips.as_ref() {
            Some(clips) if !clips.files.is_empty() => clips,
            _ => return Ok(StepOutcome::Skipped("no clips to export".to_string())),
        };

        let export = &ctx.settings.export;
        let profile = export.primary_profile();
        let export_dir = &ctx.paths.exports;
        std::fs::create_dir_all(export_dir)
            .map_err(|e| StepError::io_error("creating export directory", e))?;

        ctx.logger.info(&format!(
            "Exporting {} clips at {} with {}",
            clips.files.len(),
            export.ratio,
            profile.codec
        ));

        let total = clips.files.len();
        let mut produced = ProducedFiles::default();

        for (i, clip) in clips.files.iter().enumerate() {
            let input = video_dimensions_or(clip, FALLBACK_BASE_SIZE);
            let target = target_frame_size(input, export);
            let filter = build_scale_filter(input, target);
            let output = export_path(clip, export_dir, &export.ratio);

            ctx.logger.clip(
                i,
                total,
                &format!(
                    "export {}x{} -> {}x{}",
                    input.0, input.1, target.0, target.1
                ),
            );

            let cmd = export_command(clip, &output, &filter, &profile);
            match run_logged(ctx, &cmd, &output) {
                Ok(path) => produced.files.push(path),
                Err(e) => {
                    ctx.logger
                        .warn(&format!("Failed to export {}: {}", clip.display(), e));
                    produced.failed += 1;
                }
            }

            ctx.logger.clip_progress(i + 1, total);
        }

        ctx.logger.info(&format!(
            "Exported {} of {} clips into {}",
            produced.files.len(),
            total,
            export_dir.display()
        ));

        state.exports = Some(produced);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
        Ok(())
    }
}
