//! Pipeline step implementations.
//!
//! Each step handles one phase of a session, in this order:
//! Validate, PrepareAudio, Align, Composite, PlanClips, Cut, Export,
//! Manifest.

mod align;
mod composite;
mod cut;
mod export;
mod manifest;
mod plan;
mod prepare;
mod validate;

use std::path::{Path, PathBuf};

pub use align::AlignStep;
pub use composite::CompositeStep;
pub use cut::CutStep;
pub use export::ExportStep;
pub use manifest::ManifestStep;
pub use plan::PlanClipsStep;
pub use prepare::PrepareAudioStep;
pub use validate::ValidateStep;

use crate::media::{MediaResult, ToolCommand};
use crate::orchestrator::types::Context;

/// Log `cmd`, run it and check that `output` was written.
///
/// Tool stderr is copied into the job log on failure.
fn run_logged(ctx: &Context, cmd: &ToolCommand, output: &Path) -> MediaResult<PathBuf> {
    ctx.logger.command(&cmd.display());

    cmd.run_to(output).map_err(|e| {
        if let Some(stderr) = e.tool_output() {
            ctx.logger.tool_stderr(cmd.program(), stderr);
        }
        e
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::analysis::AlignmentStatus;
    use crate::media::{MediaInfo, MediaKind};
    use crate::models::AlignmentRecord;
    use crate::orchestrator::types::{JobState, MediaOutput};

    /// State as it looks after a dry-run Validate step.
    pub fn validated_state(duration: f64) -> JobState {
        let mut state = JobState::new("session_test");
        state.media = Some(MediaOutput {
            base: MediaInfo {
                kind: MediaKind::Video,
                duration,
                ..Default::default()
            },
            overlay_audio: MediaInfo {
                kind: MediaKind::Audio,
                duration,
                ..Default::default()
            },
            warnings: Vec::new(),
        });
        state
    }

    pub fn no_signal_record() -> AlignmentRecord {
        AlignmentRecord {
            original_offset: 0.0,
            confidence: 0.0,
            shifted_audio_path: None,
            status: AlignmentStatus::NoSignal,
            base_envelope_len: 0,
            overlay_envelope_len: 0,
            error: None,
        }
    }
}
