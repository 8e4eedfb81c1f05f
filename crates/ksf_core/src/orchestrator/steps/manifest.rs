//! Manifest step - writes `manifest.json` for the session.

use crate::models::{ProcessingRecord, SessionManifest, SessionOutputs};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

pub struct ManifestStep;

impl ManifestStep {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the manifest from the session state.
    pub fn build_manifest(ctx: &Context, state: &JobState) -> StepResult<SessionManifest> {
        let alignment = state
            .alignment
            .clone()
            .ok_or_else(|| StepError::precondition_failed("Alignment has not run"))?;
        let plan = state
            .plan
            .clone()
            .ok_or_else(|| StepError::precondition_failed("No clip plan"))?;

        let created_at = state
            .started_at
            .clone()
            .unwrap_or_else(|| chrono::Local::now().to_rfc3339());

        Ok(SessionManifest {
            session_id: ctx.session_id.clone(),
            created_at,
            inputs: ctx.inputs.clone(),
            config: ctx.settings.clone(),
            alignment,
            plan,
            processing: ProcessingRecord {
                master_video: state.composite.as_ref().map(|c| c.master.clone()),
                clips_count: state.clip_count(),
                exports_count: state.export_count(),
            },
            outputs: SessionOutputs {
                clips_src: ctx.paths.clips_src.clone(),
                exports: ctx.paths.exports.clone(),
            },
        })
    }
}

impl Default for ManifestStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ManifestStep {
    fn name(&self) -> &str {
        "Manifest"
    }

    fn description(&self) -> &str {
        "Write the session manifest"
    }

    fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        if ctx.dry_run {
            return Ok(StepOutcome::Skipped("dry run".to_string()));
        }
        if !ctx.write_manifest {
            return Ok(StepOutcome::Skipped("manifest disabled".to_string()));
        }

        let manifest = Self::build_manifest(ctx, state)?;
        let path = ctx.paths.manifest_path.clone();
        manifest.save(&path)?;

        ctx.logger
            .info(&format!("Manifest written to {}", path.display()));
        state.manifest_path = Some(path);

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match &state.manifest_path {
            Some(path) if path.exists() => Ok(()),
            Some(path) => Err(StepError::file_not_found(path.display().to_string())),
            None => Err(StepError::invalid_output("Manifest path not recorded")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::pipeline::tests::test_context;
    use crate::orchestrator::steps::test_support::{no_signal_record, validated_state};
    use crate::orchestrator::types::ProducedFiles;
    use crate::slicing::ClipPlan;

    fn finished_state() -> JobState {
        let mut state = validated_state(100.0);
        state.alignment = Some(no_signal_record());
        state.plan = Some(ClipPlan {
            clip_len: 20.0,
            uniform_starts: vec![0.0, 18.0],
            clip_starts: vec![0.0, 18.0],
            ..Default::default()
        });
        state.clips = Some(ProducedFiles {
            files: vec!["clip_000_000000_000020.mp4".into()],
            failed: 1,
        });
        state
    }

    #[test]
    fn writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = finished_state();

        let step = ManifestStep::new();
        assert_eq!(step.execute(&ctx, &mut state).unwrap(), StepOutcome::Success);
        step.validate_output(&ctx, &state).unwrap();

        let loaded = SessionManifest::load(&ctx.paths.manifest_path).unwrap();
        assert_eq!(loaded.session_id, "session_test");
        assert_eq!(loaded.clip_starts(), &[0.0, 18.0]);
        assert_eq!(loaded.processing.clips_count, 1);
        assert_eq!(loaded.processing.exports_count, 0);
        assert!(loaded.processing.master_video.is_none());
        assert_eq!(loaded.inputs, ctx.inputs);
    }

    #[test]
    fn disabled_manifest_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path()).with_manifest(false);
        let mut state = finished_state();

        let outcome = ManifestStep::new().execute(&ctx, &mut state).unwrap();
        assert_eq!(outcome, StepOutcome::Skipped("manifest disabled".to_string()));
        assert!(!ctx.paths.manifest_path.exists());
    }

    #[test]
    fn requires_plan() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = validated_state(100.0);
        state.alignment = Some(no_signal_record());

        let err = ManifestStep::new().execute(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, StepError::PreconditionFailed(_)));
    }
}
