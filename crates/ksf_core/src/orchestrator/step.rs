//! Pipeline step trait definition.

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};

/// Trait for pipeline steps.
///
/// The pipeline runner calls these methods in order:
///
/// 1. `validate_input` - Check preconditions before execution
/// 2. `execute` - Perform the step's work
/// 3. `validate_output` - Verify the step produced valid output
///
/// Steps record their results in their own `JobState` section and read
/// earlier sections; they never overwrite another step's section.
pub trait PipelineStep: Send + Sync {
    /// Get the step name (for logging and error context).
    fn name(&self) -> &str;

    /// Validate inputs before execution.
    fn validate_input(&self, ctx: &Context) -> StepResult<()>;

    /// Execute the step's main work.
    ///
    /// Returns `StepOutcome::Skipped` when the step has nothing to do
    /// (dry run, feature disabled); that is not an error.
    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    /// Validate outputs after execution.
    ///
    /// Called after `execute` returns `Success`.
    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Whether a failure of this step may be ignored.
    fn is_optional(&self) -> bool {
        false
    }

    /// Human-readable description of what this step does.
    fn description(&self) -> &str {
        self.name()
    }
}
