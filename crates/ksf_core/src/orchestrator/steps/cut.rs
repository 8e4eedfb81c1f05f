//! Cut step - stream-copies each planned window out of the master.

use std::path::{Path, PathBuf};

use crate::media::{cleanup_failed_clips, clip_file_name, cut_clip_command};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, ProducedFiles, StepOutcome};
use crate::slicing::ClipPlan;

use super::run_logged;

/// Cuts `clips_src/clip_<index>_<start>_<end>.mp4` files.
///
/// A clip that fails to cut is logged and skipped; the rest continue.
pub struct CutStep;

impl CutStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CutStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for CutStep {
    fn name(&self) -> &str {
        "Cut"
    }

    fn description(&self) -> &str {
        "Cut planned clips from the master"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        if ctx.dry_run {
            return Ok(StepOutcome::Skipped("dry run".to_string()));
        }

        let plan = match state.plan.as_ref() {
            Some(plan) if !plan.is_empty() => plan,
            _ => return Ok(StepOutcome::Skipped("no clips planned".to_string())),
        };
        let master = state
            .composite
            .as_ref()
            .map(|c| c.master.clone())
            .ok_or_else(|| StepError::precondition_failed("No composited master"))?;

        let clips_dir = &ctx.paths.clips_src;
        std::fs::create_dir_all(clips_dir)
            .map_err(|e| StepError::io_error("creating clips directory", e))?;

        let total = plan.len();
        let mut produced = ProducedFiles::default();

        for (i, (start, end, output)) in clip_outputs(plan, clips_dir).into_iter().enumerate() {
            ctx.logger
                .clip(i, total, &format!("cut {:.2}s - {:.2}s", start, end));

            let cmd = cut_clip_command(&master, &output, start, end);
            match run_logged(ctx, &cmd, &output) {
                Ok(path) if produced.files.contains(&path) => {
                    ctx.logger
                        .warn(&format!("Clip {} already cut, skipping", path.display()));
                }
                Ok(path) => produced.files.push(path),
                Err(e) => {
                    ctx.logger
                        .warn(&format!("Failed to cut clip at {:.2}s: {}", start, e));
                    produced.failed += 1;
                }
            }

            ctx.logger.clip_progress(i + 1, total);
        }

        let removed = cleanup_failed_clips(clips_dir)?;
        if removed > 0 {
            ctx.logger
                .warn(&format!("Removed {} incomplete clip file(s)", removed));
            produced.files.retain(|p| p.exists());
        }

        ctx.logger.info(&format!(
            "Cut {} of {} clips into {}",
            produced.files.len(),
            total,
            clips_dir.display()
        ));

        state.clips = Some(produced);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.clip_count() == 0 {
            return Err(StepError::invalid_output("No clips were cut"));
        }
        Ok(())
    }
}

/// `(start, end, output)` for every planned window, in plan order.
pub(crate) fn clip_outputs(plan: &ClipPlan, dir: &Path) -> Vec<(f64, f64, PathBuf)> {
    plan.windows()
        .enumerate()
        .map(|(i, (start, end))| (start, end, dir.join(clip_file_name(i, start, end))))
        .collect()
}
