//! Seam between the daemon runtime and the storage driver.
//!
//! The driver owns cluster connections and mapped devices. The runtime only
//! builds it, hands it a [`CommandRunner`], and releases it during teardown.

use thiserror::Error;

use rbd_config::Config;
use rbd_shell::CommandRunner;

const DRIVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::driver");

/// Failure reported by a driver while releasing its resources.
#[derive(Debug, Error)]
#[error("storage driver shutdown failed: {message}")]
pub struct DriverError {
    message: String,
}

impl DriverError {
    /// Creates an error with a human-readable description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Description of the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Stateful storage collaborator torn down by the shutdown orchestrator.
pub trait StorageDriver: Send {
    /// Whether the driver holds resources that must be released on exit.
    fn holds_live_resources(&self) -> bool;

    /// Releases held resources.
    ///
    /// # Errors
    ///
    /// Returns a [`DriverError`] when release fails; teardown continues
    /// regardless.
    fn shutdown(&mut self) -> Result<(), DriverError>;
}

/// Builds the storage driver once configuration and logging are ready.
pub trait DriverFactory {
    /// Driver produced by this factory.
    type Driver: StorageDriver + 'static;

    /// Creates the driver, handing it the shared command runner.
    fn build(&self, config: &Config, shell: CommandRunner) -> Self::Driver;
}

/// Factory for [`PlaceholderDriver`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderDriverFactory;

impl DriverFactory for PlaceholderDriverFactory {
    type Driver = PlaceholderDriver;

    fn build(&self, config: &Config, shell: CommandRunner) -> Self::Driver {
        tracing::warn!(
            target: DRIVER_TARGET,
            plugin = config.name(),
            "storage driver not wired in; running placeholder"
        );
        PlaceholderDriver { shell }
    }
}

/// Driver that holds no resources, used until a storage backend is wired in.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderDriver {
    shell: CommandRunner,
}

impl PlaceholderDriver {
    /// Command runner the driver would use for management tooling.
    #[must_use]
    pub const fn shell(&self) -> &CommandRunner {
        &self.shell
    }
}

impl StorageDriver for PlaceholderDriver {
    fn holds_live_resources(&self) -> bool {
        false
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}
