//! Logging for Keo Shortform Factory.
//!
//! Two layers:
//! - `tracing` for process-wide diagnostics, on stderr and optionally in a
//!   daily rolling file under the configured logs folder
//! - [`SessionLogger`], one log file per session that records pipeline
//!   steps, ffmpeg command lines, per-clip progress and a tail of ffmpeg
//!   stderr for failure reports
//!
//! # Example
//!
//! ```no_run
//! use ksf_core::logging::{LogConfig, SessionLogger};
//!
//! let logger = SessionLogger::new("session_20260101_120000", "/path/to/logs", LogConfig::default(), None)?;
//!
//! logger.step("Cut");
//! logger.command("ffmpeg -i master.mp4 -ss 0 -to 20 -c copy clip.mp4");
//! logger.clip(0, 6, "0.00s - 20.00s");
//! logger.clip_progress(1, 6);
//! # Ok::<(), std::io::Error>(())
//! ```

mod session_logger;
mod types;

use std::path::Path;

pub use session_logger::SessionLogger;
pub use types::{LineKind, LogCallback, LogConfig, LogLevel};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr-only subscriber; `RUST_LOG` overrides `default_level`.
///
/// Used when the logs folder cannot be opened.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(env_filter(default_level))
        .init();
}

/// Like [`init_tracing`], and also appends to `<logs_dir>/ksf.log.<date>`.
///
/// The returned guard flushes the file writer when dropped, so keep it
/// alive until exit.
pub fn init_tracing_with_file(default_level: LogLevel, logs_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;
    let appender = tracing_appender::rolling::daily(logs_dir, "ksf.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter(default_level))
        .init();

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}
