//! Runtime for the RBD Docker volume plugin daemon.
//!
//! The daemon loads one immutable [`rbd_config::Config`], installs structured
//! telemetry, attaches the plugin log file and then hands control to a
//! [`ShutdownOrchestrator`] that waits for signals. `SIGTERM` and `SIGINT`
//! release the storage driver, close the log and exit with status zero;
//! `SIGHUP` reopens the log file after external rotation.
//!
//! Storage drivers plug in through [`DriverFactory`] and receive a shared
//! [`rbd_shell::CommandRunner`] for invoking management tooling. The shipped
//! binary uses [`PlaceholderDriver`], which holds no resources.

mod driver;
mod logging;
mod process;
mod telemetry;

pub use driver::{
    DriverError, DriverFactory, PlaceholderDriver, PlaceholderDriverFactory, StorageDriver,
};
pub use logging::{LogError, LogHandle, LogLifecycle, LogSink};
pub use process::{
    ConfigLoader, LaunchError, ProcessExit, ShutdownError, ShutdownLatch, ShutdownOrchestrator,
    ShutdownState, SignalSource, SystemConfigLoader, SystemExit, SystemSignals, TrappedSignal,
    run_daemon,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
