//! FFmpeg/ffprobe collaborators.
//!
//! Everything here shells out to the external tools; no media is decoded
//! in-process except by [`crate::analysis::decode_audio`].
//!
//! - **Probing**: stream layout, duration, frame size
//! - **Audio**: extraction, loudness normalisation, time shifting
//! - **Video**: audio replacement, overlay compositing
//! - **Cutting**: stream-copy clips from the composited master
//! - **Export**: scale/crop to the target aspect ratio
//!
//! Each operation has a pure `*_command` builder returning a
//! [`ToolCommand`], which the orchestrator logs before running.

mod audio;
mod cutter;
mod export;
mod probe;
mod runner;
mod types;
mod video;

pub use audio::{
    extract_audio_command, extract_audio_to_wav, extracted_audio_path, normalize_loudness,
    normalize_loudness_command, normalized_audio_path, shifted_audio_path, time_shift_audio,
    time_shift_command, MIN_SHIFT_SECONDS,
};
pub use cutter::{cleanup_failed_clips, clip_file_name, cut_clip, cut_clip_command};
pub use export::{build_scale_filter, export_clip, export_command, export_path, target_frame_size};
pub use probe::{
    probe_media, validate_inputs, validate_media_compatibility, video_dimensions,
    video_dimensions_or,
};
pub use runner::ToolCommand;
pub use types::{MediaError, MediaInfo, MediaKind, MediaResult};
pub use video::{
    composite_command, composite_overlay, composite_overlay_command, overlay_filter,
    replace_audio, replace_audio_command, FALLBACK_BASE_SIZE, FALLBACK_OVERLAY_SIZE,
};
