//! Session runner: sets up a session and drives the standard pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;

use crate::config::Settings;
use crate::logging::{LogCallback, LogConfig, LogLevel, SessionLogger};
use crate::models::{session_id_for, SessionInputs};

use super::errors::{PipelineError, PipelineResult};
use super::pipeline::{CancelHandle, Pipeline, PipelineRunResult};
use super::types::{Context, JobState, ProgressCallback, SessionPaths};
use super::create_standard_pipeline;

/// What a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_id: String,
    pub paths: SessionPaths,
    pub run: PipelineRunResult,
    pub state: JobState,
    pub dry_run: bool,
}

impl SessionOutcome {
    /// Planned clip starts, empty if planning never ran.
    pub fn clip_starts(&self) -> &[f64] {
        self.state
            .plan
            .as_ref()
            .map(|p| p.clip_starts.as_slice())
            .unwrap_or(&[])
    }
}

/// Runs one session through a pipeline.
///
/// # Example
///
/// ```ignore
/// let runner = SessionRunner::new(settings).with_dry_run(true);
/// let outcome = runner.run(inputs, Path::new("shortform_output"))?;
/// println!("{:?}", outcome.clip_starts());
/// ```
pub struct SessionRunner {
    settings: Settings,
    pipeline: Pipeline,
    dry_run: bool,
    write_manifest: bool,
    log_level: LogLevel,
    logs_dir: Option<PathBuf>,
}

impl SessionRunner {
    /// Runner with the standard pipeline.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            pipeline: create_standard_pipeline(),
            dry_run: false,
            write_manifest: true,
            log_level: LogLevel::Info,
            logs_dir: None,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_manifest(mut self, write_manifest: bool) -> Self {
        self.write_manifest = write_manifest;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Where session logs go. Defaults to `paths.logs_folder`.
    pub fn with_logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = Some(dir.into());
        self
    }

    /// Replace the standard pipeline.
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.pipeline.cancel_handle()
    }

    /// Run a session under `out_root`.
    pub fn run(&self, inputs: SessionInputs, out_root: &Path) -> PipelineResult<SessionOutcome> {
        self.run_with_callbacks(inputs, out_root, None, None)
    }

    /// Run a session, forwarding log lines and progress to callbacks.
    ///
    /// Creates `<out_root>/session_YYYYmmdd_HHMMSS/` with `clips_src/` and
    /// `exports/<W>x<H>/` unless this is a dry run.
    pub fn run_with_callbacks(
        &self,
        inputs: SessionInputs,
        out_root: &Path,
        log_callback: Option<LogCallback>,
        progress_callback: Option<ProgressCallback>,
    ) -> PipelineResult<SessionOutcome> {
        let session_id = session_id_for(&Local::now());
        let paths = SessionPaths::new(out_root, &session_id, &self.settings.export.ratio);

        if !self.dry_run {
            paths.create_all().map_err(|e| {
                PipelineError::setup_failed(
                    &session_id,
                    format!("Failed to create {}: {}", paths.session_dir.display(), e),
                )
            })?;
        }

        let logs_dir = self
            .logs_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.settings.paths.logs_folder));
        let log_config = LogConfig::from_settings(&self.settings.logging, self.log_level);
        let logger = SessionLogger::new(&session_id, &logs_dir, log_config, log_callback)
            .map(Arc::new)
            .map_err(|e| {
                PipelineError::setup_failed(&session_id, format!("Failed to create logger: {}", e))
            })?;

        let mut ctx = Context::new(
            inputs,
            self.settings.clone(),
            &session_id,
            paths.clone(),
            Arc::clone(&logger),
        )
        .with_dry_run(self.dry_run)
        .with_manifest(self.write_manifest);

        if let Some(callback) = progress_callback {
            ctx = ctx.with_progress_callback(callback);
        }

        logger.info(&format!("Starting session: {}", session_id));
        logger.info(&format!("Output: {}", paths.session_dir.display()));
        if self.dry_run {
            logger.info("Dry run: media steps will be skipped");
        }

        let mut state = JobState::new(&session_id);

        let result = self.pipeline.run(&ctx, &mut state);
        let outcome = match result {
            Ok(run) => {
                logger.info(&format!(
                    "Session finished: {} clips, {} exports",
                    state.clip_count(),
                    state.export_count()
                ));
                Ok(SessionOutcome {
                    session_id,
                    paths,
                    run,
                    state,
                    dry_run: self.dry_run,
                })
            }
            Err(e) => {
                logger.error(&format!("Session failed: {}", e));
                Err(e)
            }
        };

        logger.flush();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::errors::StepResult;
    use crate::orchestrator::step::PipelineStep;
    use crate::orchestrator::types::StepOutcome;
    use crate::slicing::ClipPlan;
    use parking_lot::Mutex;

    struct FixedPlanStep;

    impl PipelineStep for FixedPlanStep {
        fn name(&self) -> &str {
            "FixedPlan"
        }

        fn validate_input(&self, _ctx: &Context) -> StepResult<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
            state.plan = Some(ClipPlan {
                clip_len: 20.0,
                clip_starts: vec![0.0, 18.0],
                ..Default::default()
            });
            Ok(StepOutcome::Success)
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }
    }

    fn inputs(dir: &Path) -> SessionInputs {
        SessionInputs {
            base_video: dir.join("base.mp4"),
            overlay_video: dir.join("face.mp4"),
            overlay_audio: dir.join("voice.wav"),
        }
    }

    #[test]
    fn creates_session_layout() {
        let dir = tempfile::tempdir().unwrap();
        let out_root = dir.path().join("out");
        let runner = SessionRunner::new(Settings::default())
            .with_logs_dir(dir.path().join("logs"))
            .with_pipeline(Pipeline::new().with_step(FixedPlanStep));

        let outcome = runner.run(inputs(dir.path()), &out_root).unwrap();

        assert!(outcome.session_id.starts_with("session_"));
        assert!(outcome.paths.clips_src.is_dir());
        assert!(outcome.paths.exports.is_dir());
        assert!(outcome.paths.exports.ends_with("exports/9x16"));
        assert_eq!(outcome.clip_starts(), &[0.0, 18.0]);
        assert_eq!(outcome.run.steps_completed, vec!["FixedPlan"]);
        assert!(dir
            .path()
            .join("logs")
            .join(format!("{}.log", outcome.session_id))
            .exists());
    }

    #[test]
    fn dry_run_creates_no_directories() {
        let dir = tempfile::tempdir().unwrap();
        let out_root = dir.path().join("out");
        let runner = SessionRunner::new(Settings::default())
            .with_dry_run(true)
            .with_logs_dir(dir.path().join("logs"))
            .with_pipeline(Pipeline::new().with_step(FixedPlanStep));

        let outcome = runner.run(inputs(dir.path()), &out_root).unwrap();
        assert!(outcome.dry_run);
        assert!(!out_root.exists());
    }

    #[test]
    fn callbacks_receive_output() {
        let dir = tempfile::tempdir().unwrap();
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let progress = Arc::new(Mutex::new(Vec::<u32>::new()));

        let runner = SessionRunner::new(Settings::default())
            .with_dry_run(true)
            .with_logs_dir(dir.path().join("logs"))
            .with_pipeline(Pipeline::new().with_step(FixedPlanStep));

        let lines_sink = Arc::clone(&lines);
        let progress_sink = Arc::clone(&progress);
        runner
            .run_with_callbacks(
                inputs(dir.path()),
                dir.path(),
                Some(Box::new(move |line: &str| lines_sink.lock().push(line.to_string()))),
                Some(Box::new(move |_: &str, percent: u32, _: &str| {
                    progress_sink.lock().push(percent)
                })),
            )
            .unwrap();

        assert!(lines.lock().iter().any(|l| l.contains("Starting session")));
        assert_eq!(progress.lock().last(), Some(&100));
    }

    #[test]
    fn standard_runner_fails_on_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SessionRunner::new(Settings::default())
            .with_dry_run(true)
            .with_logs_dir(dir.path().join("logs"));

        let err = runner.run(inputs(dir.path()), dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::StepFailed { ref step_name, .. } if step_name == "Validate"));
    }
}
