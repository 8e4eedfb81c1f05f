//! Per-session log: one file per session plus an optional line callback.
//!
//! The pipeline announces each step, steps announce their stages, and every
//! ffmpeg invocation is written as a `$ ...` command line. ffmpeg's stderr
//! is kept in a bounded tail; in compact mode it only reaches the log when a
//! step fails and the pipeline dumps the tail.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LineKind, LogCallback, LogConfig, LogLevel};

pub struct SessionLogger {
    session_id: String,
    log_path: PathBuf,
    file: Mutex<Option<BufWriter<File>>>,
    callback: Option<LogCallback>,
    config: LogConfig,
    /// Most recent ffmpeg/ffprobe stderr lines, tagged with the tool name.
    tool_tail: Mutex<VecDeque<String>>,
    /// Last progress percent that was written (compact mode).
    last_progress: Mutex<u32>,
}

impl SessionLogger {
    /// Open `<log_dir>/<session_id>.log`, creating `log_dir` if needed.
    pub fn new(
        session_id: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let session_id = session_id.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&session_id)));
        let file = File::create(&log_path)?;

        Ok(Self {
            session_id,
            log_path,
            file: Mutex::new(Some(BufWriter::new(file))),
            callback,
            tool_tail: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
            last_progress: Mutex::new(0),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// A pipeline step is starting.
    pub fn step(&self, name: &str) {
        self.write(LogLevel::Info, LineKind::Step, name);
    }

    /// A stage inside the current step.
    pub fn stage(&self, name: &str) {
        self.write(LogLevel::Info, LineKind::Stage, name);
    }

    pub fn info(&self, message: &str) {
        self.write(LogLevel::Info, LineKind::Plain, message);
    }

    pub fn debug(&self, message: &str) {
        self.write(LogLevel::Debug, LineKind::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.write(LogLevel::Warn, LineKind::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.write(LogLevel::Error, LineKind::Error, message);
    }

    pub fn success(&self, message: &str) {
        self.write(LogLevel::Info, LineKind::Success, message);
    }

    /// The command line of an external tool about to run.
    pub fn command(&self, command_line: &str) {
        self.write(LogLevel::Info, LineKind::Command, command_line);
    }

    /// A line about planned clip `index` (zero-based) of `total`.
    pub fn clip(&self, index: usize, total: usize, message: &str) {
        let kind = LineKind::Clip {
            index: index + 1,
            total,
        };
        self.write(LogLevel::Info, kind, message);
    }

    /// Progress after `done` of `total` clips.
    pub fn clip_progress(&self, done: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        self.progress(((done.min(total) * 100) / total) as u32)
    }

    /// Write `Progress: N%`.
    ///
    /// In compact mode only the first value in each `progress_step` band and
    /// 100% are written. Returns whether the line was written.
    pub fn progress(&self, percent: u32) -> bool {
        if self.config.compact {
            let mut last = self.last_progress.lock();
            let step = self.config.progress_step.max(1);
            if (percent / step) <= (*last / step) && percent < 100 {
                return false;
            }
            *last = percent;
        }

        self.write(LogLevel::Info, LineKind::Plain, &format!("Progress: {}%", percent));
        true
    }

    /// Keep the non-empty lines of `tool`'s captured stderr.
    ///
    /// Outside compact mode the lines are also written straight away.
    pub fn tool_stderr(&self, tool: &str, stderr: &str) {
        let lines: Vec<String> = stderr
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .map(|l| LineKind::Tool(tool).render(l))
            .collect();

        if self.config.error_tail > 0 {
            let mut tail = self.tool_tail.lock();
            for line in &lines {
                if tail.len() == self.config.error_tail {
                    tail.pop_front();
                }
                tail.push_back(line.clone());
            }
        }

        if !self.config.compact {
            for line in &lines {
                self.write(LogLevel::Info, LineKind::Plain, line);
            }
        }
    }

    /// Write and clear the kept tool output after `step` failed.
    pub fn dump_tool_tail(&self, step: &str) {
        let lines: Vec<String> = self.tool_tail.lock().drain(..).collect();
        if lines.is_empty() || !self.config.compact {
            return;
        }

        self.write(
            LogLevel::Error,
            LineKind::Plain,
            &format!("Last {} line(s) of tool output before {} failed:", lines.len(), step),
        );
        for line in &lines {
            self.write(LogLevel::Error, LineKind::Plain, line);
        }
    }

    pub fn flush(&self) {
        if let Some(writer) = self.file.lock().as_mut() {
            let _ = writer.flush();
        }
    }

    #[cfg(test)]
    fn tool_tail(&self) -> Vec<String> {
        self.tool_tail.lock().iter().cloned().collect()
    }

    fn write(&self, level: LogLevel, kind: LineKind<'_>, message: &str) {
        if level < self.config.level {
            return;
        }

        let body = kind.render(message);
        let line = if self.config.show_timestamps {
            format!("[{}] {}", Local::now().format("%H:%M:%S"), body)
        } else {
            body
        };

        if let Some(writer) = self.file.lock().as_mut() {
            let _ = writeln!(writer, "{}", line);
        }
        if let Some(callback) = &self.callback {
            callback(&line);
        }
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Replace characters that are not allowed in file names.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn quiet_config() -> LogConfig {
        LogConfig {
            show_timestamps: false,
            ..LogConfig::default()
        }
    }

    fn capture(config: LogConfig) -> (SessionLogger, Arc<Mutex<Vec<String>>>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let callback: LogCallback = Box::new(move |line: &str| sink.lock().push(line.to_string()));
        let logger = SessionLogger::new("session_x", dir.path(), config, Some(callback)).unwrap();
        (logger, lines, dir)
    }

    #[test]
    fn writes_session_file() {
        let dir = tempdir().unwrap();
        let logger = SessionLogger::new("session_x", dir.path(), quiet_config(), None).unwrap();
        assert_eq!(logger.session_id(), "session_x");
        assert!(logger.log_path().ends_with("session_x.log"));

        logger.step("Align");
        logger.stage("Estimating overlay offset");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert_eq!(
            content,
            "=== Align ===\n--- Estimating overlay offset ---\n"
        );
    }

    #[test]
    fn callback_respects_level() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let callback: LogCallback = Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let dir = tempdir().unwrap();
        let logger =
            SessionLogger::new("session_x", dir.path(), quiet_config(), Some(callback)).unwrap();
        logger.info("one");
        logger.warn("two");
        logger.debug("hidden");

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clip_lines_are_one_based() {
        let (logger, lines, _dir) = capture(quiet_config());
        logger.clip(0, 6, "0.00s - 20.00s");
        logger.clip(5, 6, "90.00s - 110.00s");

        assert_eq!(
            *lines.lock(),
            vec!["[clip 1/6] 0.00s - 20.00s", "[clip 6/6] 90.00s - 110.00s"]
        );
    }

    #[test]
    fn compact_progress_is_banded() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            progress_step: 20,
            ..quiet_config()
        };
        let logger = SessionLogger::new("session_x", dir.path(), config, None).unwrap();

        assert!(!logger.progress(5));
        assert!(!logger.progress(15));
        assert!(logger.progress(20));
        assert!(!logger.progress(25));
        assert!(logger.progress(40));
        assert!(logger.progress(100));
    }

    #[test]
    fn clip_progress_maps_to_percent() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            compact: false,
            ..quiet_config()
        };
        let logger = SessionLogger::new("session_x", dir.path(), config, None).unwrap();

        assert!(logger.clip_progress(3, 6));
        assert!(!logger.clip_progress(0, 0));
    }

    #[test]
    fn compact_mode_holds_stderr_until_failure() {
        let config = LogConfig {
            error_tail: 3,
            ..quiet_config()
        };
        let (logger, lines, _dir) = capture(config);

        logger.tool_stderr("ffmpeg", "frame=1\n\nframe=2\nframe=3\nInvalid data found\n");
        assert!(lines.lock().is_empty());
        assert_eq!(
            logger.tool_tail(),
            vec!["[ffmpeg] frame=2", "[ffmpeg] frame=3", "[ffmpeg] Invalid data found"]
        );

        logger.dump_tool_tail("Composite");
        let written = lines.lock().clone();
        assert_eq!(written.len(), 4);
        assert!(written[0].contains("before Composite failed"));
        assert_eq!(written[3], "[ffmpeg] Invalid data found");
        assert!(logger.tool_tail().is_empty());
    }

    #[test]
    fn verbose_mode_writes_stderr_immediately() {
        let config = LogConfig {
            compact: false,
            ..quiet_config()
        };
        let (logger, lines, _dir) = capture(config);

        logger.tool_stderr("ffprobe", "moov atom not found\n");
        assert_eq!(*lines.lock(), vec!["[ffprobe] moov atom not found"]);

        // Already written, so the failure dump adds nothing
        logger.dump_tool_tail("Validate");
        assert_eq!(lines.lock().len(), 1);
    }

    #[test]
    fn sanitizes_session_file_name() {
        assert_eq!(sanitize_filename("session_1"), "session_1");
        assert_eq!(sanitize_filename("a/b:c"), "a_b_c");
    }
}
