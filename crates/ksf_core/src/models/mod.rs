//! Data models shared across the crate.
//!
//! - Value types parsed from config and CLI (overlay position, aspect
//!   ratio, quality profile)
//! - Batch job status
//! - The per-session manifest

mod enums;
mod manifest;

pub use enums::{AspectRatio, JobStatus, OverlayPosition, ParseValueError, QualityProfile};
pub use manifest::{
    session_id_for, AlignmentRecord, ManifestError, ProcessingRecord, SessionInputs,
    SessionManifest, SessionOutputs,
};
