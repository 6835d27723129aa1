use std::fmt;
use std::io;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::{debug, info};

use super::PROCESS_TARGET;

/// Signals intercepted by the daemon.
///
/// `SIGKILL` cannot be caught and is deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrappedSignal {
    /// `SIGTERM`, sent by service managers to stop the daemon.
    Terminate,
    /// `SIGINT`, sent by an interactive interrupt.
    Interrupt,
    /// `SIGHUP`, requesting the log file be reopened.
    Hangup,
}

impl TrappedSignal {
    /// Every trapped signal.
    pub const ALL: [Self; 3] = [Self::Terminate, Self::Interrupt, Self::Hangup];

    /// Raw signal number.
    #[must_use]
    pub const fn number(self) -> i32 {
        match self {
            Self::Terminate => SIGTERM,
            Self::Interrupt => SIGINT,
            Self::Hangup => SIGHUP,
        }
    }

    /// Maps a raw signal number back to a trapped signal.
    #[must_use]
    pub fn from_number(number: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|signal| signal.number() == number)
    }

    /// Whether the signal asks the daemon to exit.
    #[must_use]
    pub const fn requests_shutdown(self) -> bool {
        matches!(self, Self::Terminate | Self::Interrupt)
    }
}

impl fmt::Display for TrappedSignal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Terminate => "SIGTERM",
            Self::Interrupt => "SIGINT",
            Self::Hangup => "SIGHUP",
        })
    }
}

/// Errors reported while installing signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The thread forwarding signals could not be started.
    #[error("failed to start signal forwarder: {source}")]
    Forwarder {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Abstraction over the delivery of trapped signals.
pub trait SignalSource {
    /// Starts listening and returns the channel signals are delivered on.
    ///
    /// # Errors
    ///
    /// Returns a [`ShutdownError`] when listening cannot start.
    fn subscribe(&self) -> Result<Receiver<TrappedSignal>, ShutdownError>;
}

impl<T: SignalSource + ?Sized> SignalSource for &T {
    fn subscribe(&self) -> Result<Receiver<TrappedSignal>, ShutdownError> {
        (**self).subscribe()
    }
}

/// Signal source backed by `signal-hook`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSignals;

impl SignalSource for SystemSignals {
    fn subscribe(&self) -> Result<Receiver<TrappedSignal>, ShutdownError> {
        let mut signals = Signals::new(TrappedSignal::ALL.map(TrappedSignal::number))
            .map_err(|source| ShutdownError::Install { source })?;
        // One slot per trapped kind, so a burst is buffered until drained.
        let (sender, receiver) = mpsc::sync_channel(TrappedSignal::ALL.len());
        thread::Builder::new()
            .name("rbdd-signals".to_owned())
            .spawn(move || {
                for number in signals.forever() {
                    let Some(signal) = TrappedSignal::from_number(number) else {
                        continue;
                    };
                    debug!(target: PROCESS_TARGET, %signal, "signal received");
                    if sender.send(signal).is_err() {
                        break;
                    }
                }
            })
            .map_err(|source| ShutdownError::Forwarder { source })?;
        info!(
            target: PROCESS_TARGET,
            signals = ?TrappedSignal::ALL,
            "signal handlers installed"
        );
        Ok(receiver)
    }
}
