//! Pipeline runner that executes steps in sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;
use super::types::{Context, JobState, StepOutcome};

/// Pipeline that runs a sequence of steps.
///
/// The pipeline executes steps in order, running validation before
/// and after each step. It handles cancellation and tracks which
/// steps were executed.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Get a cancellation handle.
    ///
    /// Call `cancel()` on the returned handle to stop the pipeline
    /// at the next step boundary.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run the pipeline with the given context and state.
    ///
    /// Executes each step in order:
    /// 1. Check for cancellation
    /// 2. Run `validate_input`
    /// 3. Run `execute`
    /// 4. Run `validate_output` (if execute returned Success)
    ///
    /// A failing optional step is logged and counted as skipped.
    pub fn run(&self, ctx: &Context, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult {
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
        };

        let total_steps = self.steps.len();

        for (i, step) in self.steps.iter().enumerate() {
            if self.is_cancelled() {
                ctx.logger.warn(&format!(
                    "Pipeline cancelled before step '{}'",
                    step.name()
                ));
                return Err(PipelineError::cancelled(&ctx.session_id));
            }

            let step_name = step.name();
            ctx.logger.step(step_name);

            let percent = ((i as f64 / total_steps as f64) * 100.0) as u32;
            ctx.report_progress(step_name, percent, &format!("Starting {}", step_name));

            let outcome = step
                .validate_input(ctx)
                .and_then(|()| step.execute(ctx, state))
                .and_then(|outcome| {
                    if outcome == StepOutcome::Success {
                        step.validate_output(ctx, state)?;
                    }
                    Ok(outcome)
                });

            match outcome {
                Ok(StepOutcome::Success) => {
                    ctx.logger.success(&format!("{} completed", step_name));
                    result.steps_completed.push(step_name.to_string());
                }
                Ok(StepOutcome::Skipped(reason)) => {
                    ctx.logger.info(&format!("{} skipped: {}", step_name, reason));
                    result.steps_skipped.push(step_name.to_string());
                }
                Err(e) if step.is_optional() => {
                    ctx.logger
                        .warn(&format!("Optional step {} failed: {}", step_name, e));
                    result.steps_skipped.push(step_name.to_string());
                }
                Err(e) => {
                    ctx.logger.error(&format!("{} failed: {}", step_name, e));
                    ctx.logger.dump_tool_tail(step_name);
                    return Err(PipelineError::step_failed(&ctx.session_id, step_name, e));
                }
            }
        }

        ctx.report_progress("Complete", 100, "Pipeline finished");
        ctx.logger.success("Pipeline completed successfully");

        Ok(result)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Get step names in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for cancelling a running pipeline.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Cancel the pipeline.
    ///
    /// The pipeline will stop at the next step boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
}

impl PipelineRunResult {
    /// Check if all steps completed (none skipped).
    pub fn all_completed(&self) -> bool {
        self.steps_skipped.is_empty()
    }

    /// Total number of steps that ran.
    pub fn total_steps(&self) -> usize {
        self.steps_completed.len() + self.steps_skipped.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::logging::{LogConfig, SessionLogger};
    use crate::models::{AspectRatio, SessionInputs};
    use crate::orchestrator::errors::StepError;
    use crate::orchestrator::types::SessionPaths;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;

    pub(crate) fn test_context(dir: &Path) -> Context {
        let logger =
            SessionLogger::new("test", dir.join("logs"), LogConfig::default(), None).unwrap();
        Context::new(
            SessionInputs {
                base_video: dir.join("base.mp4"),
                overlay_video: dir.join("face.mp4"),
                overlay_audio: dir.join("voice.wav"),
            },
            Settings::default(),
            "session_test",
            SessionPaths::new(dir, "session_test", &AspectRatio::VERTICAL),
            Arc::new(logger),
        )
    }

    struct CountingStep {
        name: &'static str,
        execute_count: Arc<AtomicUsize>,
        outcome: Result<StepOutcome, &'static str>,
        optional: bool,
    }

    impl CountingStep {
        fn ok(name: &'static str, count: &Arc<AtomicUsize>) -> Self {
            Self {
                name,
                execute_count: Arc::clone(count),
                outcome: Ok(StepOutcome::Success),
                optional: false,
            }
        }
    }

    impl PipelineStep for CountingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn validate_input(&self, _ctx: &Context) -> Result<(), StepError> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut JobState) -> Result<StepOutcome, StepError> {
            self.execute_count.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone().map_err(StepError::other)
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> Result<(), StepError> {
            Ok(())
        }

        fn is_optional(&self) -> bool {
            self.optional
        }
    }

    #[test]
    fn pipeline_builds_correctly() {
        let count = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep::ok("Step1", &count))
            .with_step(CountingStep::ok("Step2", &count));

        assert_eq!(pipeline.step_count(), 2);
        assert_eq!(pipeline.step_names(), vec!["Step1", "Step2"]);
    }

    #[test]
    fn runs_steps_in_order_and_records_skips() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = JobState::new("session_test");
        let count = Arc::new(AtomicUsize::new(0));

        let mut skipping = CountingStep::ok("Skipper", &count);
        skipping.outcome = Ok(StepOutcome::Skipped("nothing to do".to_string()));

        let pipeline = Pipeline::new()
            .with_step(CountingStep::ok("First", &count))
            .with_step(skipping)
            .with_step(CountingStep::ok("Last", &count));

        let result = pipeline.run(&ctx, &mut state).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(result.steps_completed, vec!["First", "Last"]);
        assert_eq!(result.steps_skipped, vec!["Skipper"]);
        assert!(!result.all_completed());
        assert_eq!(result.total_steps(), 3);
    }

    #[test]
    fn failure_stops_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = JobState::new("session_test");
        let count = Arc::new(AtomicUsize::new(0));

        let mut failing = CountingStep::ok("Broken", &count);
        failing.outcome = Err("exploded");

        let pipeline = Pipeline::new()
            .with_step(failing)
            .with_step(CountingStep::ok("Never", &count));

        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, PipelineError::StepFailed { ref step_name, .. } if step_name == "Broken"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn optional_failure_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = JobState::new("session_test");
        let count = Arc::new(AtomicUsize::new(0));

        let mut failing = CountingStep::ok("Extra", &count);
        failing.outcome = Err("exploded");
        failing.optional = true;

        let pipeline = Pipeline::new()
            .with_step(failing)
            .with_step(CountingStep::ok("Main", &count));

        let result = pipeline.run(&ctx, &mut state).unwrap();
        assert_eq!(result.steps_skipped, vec!["Extra"]);
        assert_eq!(result.steps_completed, vec!["Main"]);
    }

    #[test]
    fn cancel_handle_stops_before_next_step() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let mut state = JobState::new("session_test");
        let count = Arc::new(AtomicUsize::new(0));

        let pipeline = Pipeline::new().with_step(CountingStep::ok("Step", &count));
        let handle = pipeline.cancel_handle();

        assert!(!pipeline.is_cancelled());
        handle.cancel();
        assert!(pipeline.is_cancelled());
        assert!(handle.is_cancelled());

        let err = pipeline.run(&ctx, &mut state).unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled { .. }));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
