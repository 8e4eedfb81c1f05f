//! Session log configuration and line formatting.

use serde::{Deserialize, Serialize};

use crate::config::LoggingSettings;

/// Minimum severity a session log writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter directive understood by `EnvFilter`.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// How a session log behaves, resolved from the `[logging]` section.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Keep ffmpeg stderr out of the log unless a step fails, and thin out
    /// progress lines to every `progress_step` percent.
    pub compact: bool,
    pub progress_step: u32,
    /// How many ffmpeg stderr lines are kept for the failure dump.
    pub error_tail: usize,
    pub show_timestamps: bool,
}

impl LogConfig {
    pub fn from_settings(settings: &LoggingSettings, level: LogLevel) -> Self {
        Self {
            level,
            compact: settings.compact,
            progress_step: settings.progress_step.max(1),
            error_tail: settings.error_tail as usize,
            show_timestamps: settings.show_timestamps,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_settings(&LoggingSettings::default(), LogLevel::Info)
    }
}

/// Receives every formatted line a session logger writes.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// What a session log line describes; decides its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// A pipeline step starting: `=== Align ===`
    Step,
    /// A stage inside a step: `--- Compositing overlay video ---`
    Stage,
    /// An external tool invocation: `$ ffmpeg ...`
    Command,
    /// One planned clip being cut or exported: `[clip 3/12] ...`
    Clip { index: usize, total: usize },
    /// A line of external tool output: `[ffmpeg] ...`
    Tool(&'a str),
    Success,
    Warning,
    Error,
    Debug,
    Plain,
}

impl LineKind<'_> {
    pub fn render(&self, message: &str) -> String {
        match self {
            LineKind::Step => format!("=== {} ===", message),
            LineKind::Stage => format!("--- {} ---", message),
            LineKind::Command => format!("$ {}", message),
            LineKind::Clip { index, total } => format!("[clip {}/{}] {}", index, total, message),
            LineKind::Tool(tool) => format!("[{}] {}", tool, message),
            LineKind::Success => format!("[OK] {}", message),
            LineKind::Warning => format!("[WARNING] {}", message),
            LineKind::Error => format!("[ERROR] {}", message),
            LineKind::Debug => format!("[DEBUG] {}", message),
            LineKind::Plain => message.to_string(),
        }
    }
}
