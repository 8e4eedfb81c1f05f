//! External tool command wrapper.
//!
//! Media operations build a [`ToolCommand`] first and run it second, so
//! callers can log the exact command line and tests can check arguments
//! without spawning anything.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::types::{MediaError, MediaResult};

/// An ffmpeg or ffprobe invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// `ffmpeg -y -hide_banner -loglevel error`.
    pub fn ffmpeg() -> Self {
        Self::new("ffmpeg").args(["-y", "-hide_banner", "-loglevel", "error"])
    }

    /// `ffprobe -v quiet`.
    pub fn ffprobe() -> Self {
        Self::new("ffprobe").args(["-v", "quiet"])
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `-i <path>`.
    pub fn input(self, path: &Path) -> Self {
        self.arg("-i").arg(path)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments as (lossy) strings, for logs and assertions.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    /// The command line as it would be typed in a shell.
    pub fn display(&self) -> String {
        format_command(&self.program, &self.arg_strings())
    }

    /// Run to completion, failing on a non-zero exit.
    pub fn run(&self) -> MediaResult<Output> {
        tracing::debug!("Running: {}", self.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| MediaError::ToolNotRun {
                tool: self.program.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::CommandFailed {
                tool: self.program.clone(),
                exit_code: output.status.code().unwrap_or(-1),
                message: stderr.trim().to_string(),
            });
        }

        Ok(output)
    }

    /// Run and check that `output_path` was written.
    pub fn run_to(&self, output_path: &Path) -> MediaResult<PathBuf> {
        self.run()?;
        ensure_output(output_path)?;
        Ok(output_path.to_path_buf())
    }
}

/// Fail unless `path` exists and is non-empty.
pub(crate) fn ensure_output(path: &Path) -> MediaResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(MediaError::OutputMissing(path.to_path_buf())),
    }
}

pub(crate) fn require_file(path: &Path) -> MediaResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(MediaError::FileNotFound(path.to_path_buf()))
    }
}

/// `<dir>/<stem of input><suffix>`.
pub(crate) fn derived_path(input: &Path, dir: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    dir.join(format!("{}{}", stem, suffix))
}

/// Render a command line for logs, quoting empty arguments and arguments
/// with whitespace.
fn format_command(program: &str, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(program.to_string());
    for arg in args {
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            parts.push(format!("'{}'", arg));
        } else {
            parts.push(arg.clone());
        }
    }
    parts.join(" ")
}
