//! Pipeline orchestrator for running shortform sessions.
//!
//! A session is a sequence of steps that validate, execute, and record
//! their results in a shared `JobState`.
//!
//! # Architecture
//!
//! ```text
//! SessionRunner
//!     └── Pipeline
//!         ├── Step: Validate
//!         ├── Step: PrepareAudio
//!         ├── Step: Align
//!         ├── Step: Composite
//!         ├── Step: PlanClips
//!         ├── Step: Cut
//!         ├── Step: Export
//!         └── Step: Manifest
//! ```
//!
//! In a dry run only Validate and PlanClips do any work; the rest skip
//! themselves.
//!
//! # Example
//!
//! ```ignore
//! use ksf_core::orchestrator::SessionRunner;
//!
//! let outcome = SessionRunner::new(settings)
//!     .with_dry_run(true)
//!     .run(inputs, Path::new("shortform_output"))?;
//! println!("Completed: {:?}", outcome.run.steps_completed);
//! ```

mod errors;
mod pipeline;
mod runner;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use runner::{SessionOutcome, SessionRunner};
pub use step::PipelineStep;
pub use steps::{
    AlignStep, CompositeStep, CutStep, ExportStep, ManifestStep, PlanClipsStep, PrepareAudioStep,
    ValidateStep,
};
pub use types::{
    CompositeOutput, Context, JobState, MediaOutput, PrepareOutput, ProducedFiles,
    ProgressCallback, SessionPaths, StepOutcome,
};

/// Create a standard pipeline with all steps in the correct order.
///
/// 1. Validate - check inputs and probe media
/// 2. PrepareAudio - extract base audio, normalise overlay loudness
/// 3. Align - estimate and apply the overlay audio offset
/// 4. Composite - replace base audio and overlay the face video
/// 5. PlanClips - choose clip windows
/// 6. Cut - cut clips from the master
/// 7. Export - scale and crop clips to the target ratio
/// 8. Manifest - write `manifest.json`
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(ValidateStep::new())
        .with_step(PrepareAudioStep::new())
        .with_step(AlignStep::new())
        .with_step(CompositeStep::new())
        .with_step(PlanClipsStep::new())
        .with_step(CutStep::new())
        .with_step(ExportStep::new())
        .with_step(ManifestStep::new())
}
