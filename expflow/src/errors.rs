//! Error types for the expflow orchestrator.
//!
//! The taxonomy separates definition-time failures (`ConfigError`) from
//! run-time failures (`DispatchError`, `JobFailure`) and from reporting
//! problems (`NotFoundError`), which never abort a pipeline run.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for expflow operations.
#[derive(Debug, Error)]
pub enum ExpflowError {
    /// A pipeline definition or configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The compute backend could not accept a job.
    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    /// A dispatched command reached a failed terminal state.
    #[error("{0}")]
    Job(#[from] JobFailure),

    /// An expected result directory was missing.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error raised when a pipeline definition or run configuration is malformed.
///
/// Raised at graph-construction time, before any stage executes.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigError {
    /// The error message.
    pub message: String,
    /// Stage indices involved in the error, if any.
    pub stage_indices: Vec<u32>,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stage_indices: Vec::new(),
        }
    }

    /// Sets the stage indices involved.
    #[must_use]
    pub fn with_stage_indices(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.stage_indices = indices.into_iter().collect();
        self
    }
}

/// Error raised when the compute backend refuses a command.
///
/// Covers spawn failures (missing executable, permission denied) and queue
/// submission failures. Distinct from [`JobFailure`], which means the backend
/// accepted the job and the job itself failed.
#[derive(Debug, Clone, Error)]
#[error("failed to dispatch `{command}`: {reason}")]
pub struct DispatchError {
    /// Rendered command line that could not be dispatched.
    pub command: String,
    /// Backend-supplied reason.
    pub reason: String,
}

impl DispatchError {
    /// Creates a new dispatch error.
    #[must_use]
    pub fn new(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// A dispatched command reached a failed terminal state.
#[derive(Debug, Clone, Error)]
pub enum JobFailure {
    /// The command exited with a non-zero code.
    #[error("command `{command}` exited with code {code}")]
    NonZeroExit {
        /// Rendered command line.
        command: String,
        /// The non-zero exit code.
        code: i32,
    },

    /// The command was terminated by a signal before producing an exit code.
    #[error("command `{command}` was terminated by a signal")]
    Signalled {
        /// Rendered command line.
        command: String,
    },

    /// The command exceeded its configured wall-clock limit.
    #[error("command `{command}` timed out after {seconds}s")]
    TimedOut {
        /// Rendered command line.
        command: String,
        /// The limit in seconds.
        seconds: u64,
    },

    /// The command was cancelled because a sibling job in the same stage failed.
    #[error("command `{command}` was cancelled after a sibling failed")]
    Cancelled {
        /// Rendered command line.
        command: String,
    },
}

impl JobFailure {
    /// Creates a non-zero-exit failure.
    #[must_use]
    pub fn exit(command: impl Into<String>, code: i32) -> Self {
        Self::NonZeroExit {
            command: command.into(),
            code,
        }
    }

    /// Creates a signal-termination failure.
    #[must_use]
    pub fn signalled(command: impl Into<String>) -> Self {
        Self::Signalled {
            command: command.into(),
        }
    }

    /// Creates a timeout failure.
    #[must_use]
    pub fn timed_out(command: impl Into<String>, seconds: u64) -> Self {
        Self::TimedOut {
            command: command.into(),
            seconds,
        }
    }

    /// Creates a sibling-cancellation failure.
    #[must_use]
    pub fn cancelled(command: impl Into<String>) -> Self {
        Self::Cancelled {
            command: command.into(),
        }
    }

    /// Returns the rendered command line of the failed command.
    #[must_use]
    pub fn command(&self) -> &str {
        match self {
            Self::NonZeroExit { command, .. }
            | Self::Signalled { command }
            | Self::TimedOut { command, .. }
            | Self::Cancelled { command } => command,
        }
    }

    /// Returns the exit code, if the command produced one.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this failure is a sibling cancellation rather than a
    /// failure of the command itself.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Error raised when a result directory does not exist.
///
/// Reported as a warning by result collection helpers; never fatal to a run.
#[derive(Debug, Clone, Error)]
#[error("results directory not found: {}", path.display())]
pub struct NotFoundError {
    /// The missing path.
    pub path: PathBuf,
}

impl NotFoundError {
    /// Creates a new not-found error.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}
