//! Ordered teardown driven by trapped signals.
//!
//! The orchestrator owns the [`LogHandle`] and the storage driver once the
//! daemon is running, which makes it the only path that tears either down.
//! The first termination signal releases the driver, closes the log file and
//! exits; every later delivery observes the latch and is absorbed.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use tracing::{error, info, warn};

use crate::driver::StorageDriver;
use crate::logging::{LogHandle, LogLifecycle};

use super::PROCESS_TARGET;
use super::signals::TrappedSignal;
use super::state::{ShutdownLatch, ShutdownState};

/// Exit status used after a clean teardown.
const EXIT_SUCCESS: i32 = 0;

/// Terminates the process once teardown has completed.
pub trait ProcessExit: Send {
    /// Ends the process with `code`.
    fn exit(&self, code: i32);
}

/// Exits through [`std::process::exit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExit;

impl ProcessExit for SystemExit {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Listener that turns trapped signals into log rotation or teardown.
#[derive(Debug)]
pub struct ShutdownOrchestrator<D, E> {
    lifecycle: LogLifecycle,
    handle: LogHandle,
    driver: D,
    exit: E,
    latch: Arc<ShutdownLatch>,
}

impl<D, E> ShutdownOrchestrator<D, E> {
    /// Takes ownership of the log handle and the driver.
    #[must_use]
    pub fn new(lifecycle: LogLifecycle, handle: LogHandle, driver: D, exit: E) -> Self {
        Self {
            lifecycle,
            handle,
            driver,
            exit,
            latch: Arc::new(ShutdownLatch::new()),
        }
    }

    /// Shared view of the shutdown state.
    #[must_use]
    pub fn latch(&self) -> Arc<ShutdownLatch> {
        Arc::clone(&self.latch)
    }

    /// Current shutdown state.
    #[must_use]
    pub fn state(&self) -> ShutdownState {
        self.latch.state()
    }

    /// Log handle currently owned by the orchestrator.
    #[must_use]
    pub const fn log_handle(&self) -> &LogHandle {
        &self.handle
    }

    /// Storage driver owned by the orchestrator.
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Exit hook owned by the orchestrator.
    #[must_use]
    pub const fn exit_hook(&self) -> &E {
        &self.exit
    }
}

impl<D, E> ShutdownOrchestrator<D, E>
where
    D: StorageDriver,
    E: ProcessExit,
{
    /// Drains `signals` until the channel closes, returning the orchestrator.
    ///
    /// With [`SystemExit`] the first termination signal never returns.
    #[must_use]
    pub fn run(mut self, signals: &Receiver<TrappedSignal>) -> Self {
        for signal in signals {
            self.handle_signal(signal);
        }
        if self.latch.state() == ShutdownState::Running {
            warn!(target: PROCESS_TARGET, "signal channel closed before shutdown");
        }
        self
    }

    /// Runs [`Self::run`] on a dedicated thread.
    ///
    /// # Errors
    ///
    /// Returns the IO error raised when the thread cannot be spawned.
    pub fn spawn(self, signals: Receiver<TrappedSignal>) -> io::Result<JoinHandle<Self>>
    where
        D: 'static,
        E: 'static,
    {
        thread::Builder::new()
            .name("rbdd-shutdown".to_owned())
            .spawn(move || self.run(&signals))
    }

    /// Reacts to one delivered signal.
    pub fn handle_signal(&mut self, signal: TrappedSignal) {
        if !signal.requests_shutdown() {
            self.reload_log(signal);
            return;
        }
        if self.latch.begin() {
            self.teardown(signal);
        } else {
            info!(
                target: PROCESS_TARGET,
                %signal,
                state = ?self.latch.state(),
                "shutdown already in progress, ignoring signal"
            );
        }
    }

    fn reload_log(&mut self, signal: TrappedSignal) {
        if self.latch.state() != ShutdownState::Running {
            info!(target: PROCESS_TARGET, %signal, "ignoring log reload during shutdown");
            return;
        }
        if let Err(error) = self.lifecycle.reload(&mut self.handle) {
            error!(
                target: PROCESS_TARGET,
                %error,
                "log reload failed, continuing on stderr"
            );
        }
    }

    fn teardown(&mut self, signal: TrappedSignal) {
        info!(target: PROCESS_TARGET, %signal, "received termination signal");
        if self.driver.holds_live_resources() {
            match self.driver.shutdown() {
                Ok(()) => info!(target: PROCESS_TARGET, "storage driver released"),
                Err(error) => error!(
                    target: PROCESS_TARGET,
                    %error,
                    "storage driver shutdown failed, continuing teardown"
                ),
            }
        }
        self.lifecycle.shutdown(&mut self.handle);
        if !self.latch.finish() {
            warn!(
                target: PROCESS_TARGET,
                state = ?self.latch.state(),
                "shutdown latch left in unexpected state"
            );
        }
        info!(target: PROCESS_TARGET, "shutdown sequence completed");
        self.exit.exit(EXIT_SUCCESS);
    }
}
