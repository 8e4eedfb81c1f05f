//! PlanClips step - chooses clip start times for the source video.
//!
//! Runs in dry runs against the base video. Scene detection and hook
//! scoring failures fall back to no scenes and uniform hooks.

use std::path::{Path, PathBuf};

use crate::analysis::{decode_audio, AudioData};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};
use crate::slicing::{detect_scenes, plan_clip_starts};

pub struct PlanClipsStep;

impl PlanClipsStep {
    pub fn new() -> Self {
        Self
    }

    /// The composited master, or the base video when there is none.
    fn source_video(ctx: &Context, state: &JobState) -> PathBuf {
        state
            .composite
            .as_ref()
            .map(|c| c.master.clone())
            .unwrap_or_else(|| ctx.inputs.base_video.clone())
    }

    /// Audio hooks are scored on: the shifted overlay when it exists.
    fn hook_audio_path(ctx: &Context, state: &JobState) -> PathBuf {
        state
            .alignment
            .as_ref()
            .and_then(|a| a.shifted_audio_path.clone())
            .unwrap_or_else(|| ctx.inputs.overlay_audio.clone())
    }

    fn scenes(ctx: &Context, source: &Path) -> Vec<f64> {
        let slicing = &ctx.settings.slicing;
        if !slicing.scene_detect {
            return Vec::new();
        }

        ctx.logger.stage("Detecting scenes");
        match detect_scenes(source, slicing.min_scene_len) {
            Ok(scenes) => {
                ctx.logger
                    .info(&format!("Found {} scene boundaries", scenes.len()));
                scenes
            }
            Err(e) => {
                ctx.logger
                    .warn(&format!("Scene detection failed, ignoring scenes: {}", e));
                Vec::new()
            }
        }
    }

    fn hook_audio(ctx: &Context, state: &JobState) -> Option<AudioData> {
        if !ctx.settings.slicing.hook_detect {
            return None;
        }

        let path = Self::hook_audio_path(ctx, state);
        ctx.logger.stage(&format!("Scoring hooks in {}", path.display()));
        match decode_audio(&path, ctx.settings.alignment.sample_rate) {
            Ok(audio) => Some(audio),
            Err(e) => {
                ctx.logger
                    .warn(&format!("Audio decode failed, using uniform hooks: {}", e));
                None
            }
        }
    }
}

impl Default for PlanClipsStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for PlanClipsStep {
    fn name(&self) -> &str {
        "PlanClips"
    }

    fn description(&self) -> &str {
        "Select clip windows"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let duration = state
            .source_duration()
            .ok_or_else(|| StepError::precondition_failed("Source duration is unknown"))?;

        let source = Self::source_video(ctx, state);
        let slicing = &ctx.settings.slicing;
        ctx.logger.info(&format!(
            "Planning {}s clips every {}s over {:.2}s of {}",
            slicing.clip_len,
            slicing.stride,
            duration,
            source.display()
        ));

        let scenes = Self::scenes(ctx, &source);
        let audio = Self::hook_audio(ctx, state);

        let plan = plan_clip_starts(duration, audio.as_ref(), &scenes, slicing)?;

        if plan.is_empty() {
            ctx.logger.warn(&format!(
                "Source is shorter than one clip ({:.2}s < {}s), nothing to cut",
                duration, slicing.clip_len
            ));
        }
        for hook in &plan.hooks {
            ctx.logger.debug(&format!(
                "Hook at {:.2}s: score {:.3} ({:?})",
                hook.timestamp, hook.hook_score, hook.recommendation
            ));
        }
        ctx.logger.info(&format!(
            "Planned {} clips: {}",
            plan.len(),
            plan.clip_starts
                .iter()
                .map(|s| format!("{:.2}", s))
                .collect::<Vec<_>>()
                .join(", ")
        ));

        state.plan = Some(plan);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let plan = state
            .plan
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("Clip plan not recorded"))?;

        if plan.clip_starts.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(StepError::invalid_output("Clip plan has invalid start times"));
        }
        Ok(())
    }
}
