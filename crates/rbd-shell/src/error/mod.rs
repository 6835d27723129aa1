//! Errors raised while running external commands and filtering their output.
//!
//! I/O errors are wrapped in `Arc` so results stay cheap to clone and small
//! enough for the `result_large_err` Clippy lint.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single command invocation, reported inside a
/// [`CommandResult`](crate::CommandResult).
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// The program could not be started (for example, it does not exist).
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// Program that was requested.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The program ran but exited with a non-zero status.
    #[error("'{program}' exited with non-zero status {status}")]
    NonZeroExit {
        /// Program that was run.
        program: String,
        /// Exit status reported by the operating system.
        status: i32,
    },

    /// The program was terminated by a signal before it could exit.
    #[error("'{program}' was terminated by signal {signal}")]
    Signalled {
        /// Program that was run.
        program: String,
        /// Terminating signal number.
        signal: i32,
    },

    /// Collecting the program's output or exit status failed.
    #[error("failed to collect output of '{program}': {source}")]
    Wait {
        /// Program that was run.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The worker thread supervising the program could not be started.
    #[error("failed to start worker for '{program}': {source}")]
    WorkerSpawn {
        /// Program that was run.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The worker thread stopped without handing back a result.
    #[error("worker for '{program}' stopped without reporting a result")]
    WorkerLost {
        /// Program that was run.
        program: String,
    },
}

impl CommandError {
    /// Program the failed invocation referred to.
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::Spawn { program, .. }
            | Self::NonZeroExit { program, .. }
            | Self::Signalled { program, .. }
            | Self::Wait { program, .. }
            | Self::WorkerSpawn { program, .. }
            | Self::WorkerLost { program } => program,
        }
    }
}

/// Errors returned by [`CommandRunner::run_with_timeout`](crate::CommandRunner::run_with_timeout)
/// instead of a command result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    /// The timeout was zero, so nothing was spawned.
    #[error("timeout duration needs to be positive, got {timeout:?}")]
    InvalidTimeout {
        /// Rejected duration.
        timeout: Duration,
    },

    /// The deadline elapsed before the command completed.
    #[error("reached timeout of {timeout:?} running '{program}'")]
    TimedOut {
        /// Program that was killed.
        program: String,
        /// Configured deadline.
        timeout: Duration,
    },
}

impl RunError {
    /// Returns the duration carried by the error.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        match self {
            Self::InvalidTimeout { timeout } | Self::TimedOut { timeout, .. } => *timeout,
        }
    }
}

/// Reasons a line filter degrades to an empty result.
#[derive(Debug, Error)]
pub enum PatternError {
    /// A literal search was requested with an empty pattern.
    #[error("unable to look for empty pattern")]
    Empty,

    /// The regular expression failed to compile.
    #[error("unable to compile regexp '{pattern}': {source}")]
    Invalid {
        /// Pattern as supplied by the caller.
        pattern: String,
        /// Compilation failure.
        #[source]
        source: regex::Error,
    },
}
