//! Log destination lifecycle: attach, detach and rotate the plugin log file.
//!
//! The open file lives in a [`LogSink`], the writer handed to the tracing
//! subscriber. While no file is attached the sink writes to stderr. The
//! [`LogHandle`] returned by [`LogLifecycle::setup`] is the ownership token
//! for the attached file; only the holder of the handle may detach or rotate
//! it.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::mem;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::MakeWriter;

use rbd_config::Config;

/// Tracing target for log lifecycle events.
const LOGGING_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::logging");

/// Permission bits requested for a newly created log file, before umask.
const LOG_FILE_MODE: u32 = 0o666;

/// Errors raised while attaching the log destination.
#[derive(Debug, Error)]
pub enum LogError {
    /// The destination could not be opened for a reason other than
    /// permissions.
    #[error("failed to open log file '{path}': {source}")]
    Open {
        /// Destination that failed to open.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A log file is already attached to the sink.
    #[error("a log file is already attached; refusing to open '{path}'")]
    AlreadyAttached {
        /// Destination that was requested.
        path: PathBuf,
    },
}

/// Ownership token for the log destination.
#[derive(Debug, Default, PartialEq, Eq)]
#[must_use]
pub enum LogHandle {
    /// No file is attached; output goes to stderr.
    #[default]
    Unattached,
    /// The sink holds the open file at `path`.
    Attached {
        /// Destination of the attached file.
        path: PathBuf,
    },
}

impl LogHandle {
    /// Whether a file is attached.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        matches!(self, Self::Attached { .. })
    }

    /// Path of the attached file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Unattached => None,
            Self::Attached { path } => Some(path),
        }
    }
}

/// Writer shared with the tracing subscriber.
///
/// Cloning the sink shares the same slot. At most one file occupies the slot
/// at a time.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    slot: Arc<Mutex<Option<File>>>,
}

impl LogSink {
    /// Creates a sink writing to stderr.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a file currently occupies the sink.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.lock().is_some()
    }

    /// Installs `file`, handing it back when the slot is already occupied.
    fn attach(&self, file: File) -> Result<(), File> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(file);
        }
        *slot = Some(file);
        Ok(())
    }

    /// Removes and returns the attached file.
    fn detach(&self) -> Option<File> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Writer produced by [`LogSink`] for a single log event.
#[derive(Debug)]
pub struct SinkWriter<'a> {
    slot: MutexGuard<'a, Option<File>>,
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.slot.as_mut() {
            Some(file) => file.write(buf),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.slot.as_mut() {
            Some(file) => file.flush(),
            None => io::stderr().flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = SinkWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter { slot: self.lock() }
    }
}

/// Attaches, detaches and rotates the plugin log file.
#[derive(Debug, Clone)]
pub struct LogLifecycle {
    sink: LogSink,
    destination: PathBuf,
    debug: bool,
}

impl LogLifecycle {
    /// Creates a lifecycle for `destination`. In debug mode no file is ever
    /// attached.
    #[must_use]
    pub fn new(sink: LogSink, destination: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            sink,
            destination: destination.into(),
            debug,
        }
    }

    /// Creates a lifecycle for the log file named by the configuration.
    #[must_use]
    pub fn from_config(sink: LogSink, config: &Config) -> Self {
        Self::new(
            sink,
            config.log_file_path().into_std_path_buf(),
            config.debug_enabled(),
        )
    }

    /// Configured log destination.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Sink receiving log output.
    #[must_use]
    pub const fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// Attaches the destination in append mode.
    ///
    /// Debug mode keeps output on stderr. A permission failure also falls
    /// back to stderr, with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::AlreadyAttached`] when the sink already holds a
    /// file, and [`LogError::Open`] for any non-permission open failure.
    pub fn setup(&self) -> Result<LogHandle, LogError> {
        if self.debug {
            debug!(target: LOGGING_TARGET, "debug mode, logging to stderr");
            return Ok(LogHandle::Unattached);
        }
        if self.sink.is_attached() {
            return Err(self.already_attached());
        }
        let file = match open_append(&self.destination) {
            Ok(file) => file,
            Err(source) => return fallback_for_open_failure(&self.destination, source),
        };
        info!(
            target: LOGGING_TARGET,
            file = %self.destination.display(),
            "setting log file"
        );
        self.sink.attach(file).map_err(|_file| self.already_attached())?;
        Ok(LogHandle::Attached {
            path: self.destination.clone(),
        })
    }

    /// Flushes and closes the attached file, leaving `handle` unattached.
    ///
    /// Calling this on an unattached handle does nothing.
    pub fn shutdown(&self, handle: &mut LogHandle) {
        let LogHandle::Attached { path } = mem::take(handle) else {
            return;
        };
        info!(target: LOGGING_TARGET, file = %path.display(), "closing log file");
        let Some(mut file) = self.sink.detach() else {
            return;
        };
        if let Err(error) = file.flush().and_then(|()| file.sync_all()) {
            warn!(
                target: LOGGING_TARGET,
                file = %path.display(),
                %error,
                "failed to flush log file"
            );
        }
    }

    /// Closes the current destination, then attaches it again.
    ///
    /// The previous file is always closed before the new one is opened.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::setup`] failures; `handle` is then unattached.
    pub fn reload(&self, handle: &mut LogHandle) -> Result<(), LogError> {
        info!(target: LOGGING_TARGET, "reloading log");
        self.shutdown(handle);
        *handle = self.setup()?;
        Ok(())
    }

    fn already_attached(&self) -> LogError {
        LogError::AlreadyAttached {
            path: self.destination.clone(),
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .mode(LOG_FILE_MODE)
        .open(path)
}

/// Downgrades permission failures to stderr logging; anything else is fatal.
fn fallback_for_open_failure(path: &Path, source: io::Error) -> Result<LogHandle, LogError> {
    if source.kind() == io::ErrorKind::PermissionDenied {
        warn!(
            target: LOGGING_TARGET,
            file = %path.display(),
            error = %source,
            "logging fallback to stderr"
        );
        return Ok(LogHandle::Unattached);
    }
    Err(LogError::Open {
        path: path.to_path_buf(),
        source,
    })
}
