//! Batch processing of many sessions.
//!
//! Jobs are added one by one, loaded from a CSV file or built from a folder
//! of base videos sharing one overlay. `BatchProcessor::process_all` runs
//! them on a bounded worker pool; a failing job never stops the batch.
//!
//! CSV layout:
//!
//! ```text
//! base_video,overlay_video,overlay_audio,preset
//! ep1.mp4,face1.mov,voice1.wav,presets/tiktok.toml
//! ep2.mp4,face2.mov,voice2.wav,
//! ```
//!
//! An empty preset column falls back to the processor's base preset.

mod processor;

use std::path::PathBuf;

pub use processor::{
    create_batch_from_folder, discover_videos_in_folder, BatchJob, BatchProcessor, BatchSummary,
    BatchValidation, JobOutcome, VIDEO_EXTENSIONS,
};

/// Errors from batch setup and bookkeeping.
///
/// Failures inside a job are recorded on the job, not raised.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Batch I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid batch CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error("Failed to start worker pool: {0}")]
    Pool(String),

    #[error("Failed to write batch manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

impl BatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BatchError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Type alias for batch results.
pub type BatchResult<T> = Result<T, BatchError>;
