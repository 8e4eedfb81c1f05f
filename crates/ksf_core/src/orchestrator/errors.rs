//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Session → Step → Operation → Detail

use std::io;

use thiserror::Error;

use crate::media::MediaError;
use crate::models::ManifestError;
use crate::slicing::SlicingError;

/// Top-level pipeline error with session context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed during execution.
    #[error("Session '{session_id}' failed at step '{step_name}': {source}")]
    StepFailed {
        session_id: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// Pipeline was cancelled.
    #[error("Session '{session_id}' was cancelled")]
    Cancelled { session_id: String },

    /// Failed to set up the session (create directories, logger, etc.).
    #[error("Session '{session_id}' setup failed: {message}")]
    SetupFailed { session_id: String, message: String },
}

impl PipelineError {
    pub fn step_failed(
        session_id: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            session_id: session_id.into(),
            step_name: step_name.into(),
            source,
        }
    }

    pub fn setup_failed(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(session_id: impl Into<String>) -> Self {
        Self::Cancelled {
            session_id: session_id.into(),
        }
    }
}

/// Error from a pipeline step with operation context.
#[derive(Error, Debug)]
pub enum StepError {
    /// Input validation failed.
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    /// Output validation failed.
    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// An external command failed.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// File I/O error.
    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// A required file was not found.
    #[error("Required file not found: {path}")]
    FileNotFound { path: String },

    /// A previous step did not record what this one needs.
    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),

    /// Generic step error with message.
    #[error("{0}")]
    Other(String),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn command_failed(
        tool: impl Into<String>,
        exit_code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<MediaError> for StepError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::CommandFailed {
                tool,
                exit_code,
                message,
            } => StepError::CommandFailed {
                tool,
                exit_code,
                message,
            },
            MediaError::FileNotFound(path) => StepError::file_not_found(path.display().to_string()),
            MediaError::Io(source) => StepError::io_error("media operation", source),
            other => StepError::other(other.to_string()),
        }
    }
}

impl From<SlicingError> for StepError {
    fn from(err: SlicingError) -> Self {
        match err {
            SlicingError::InvalidInput(message) => StepError::InvalidInput(message),
            other => StepError::other(other.to_string()),
        }
    }
}

impl From<ManifestError> for StepError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Io(source) => StepError::io_error("writing manifest", source),
            other => StepError::other(other.to_string()),
        }
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
