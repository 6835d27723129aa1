//! Process supervision: signal trapping, ordered teardown and launch.

pub(crate) mod errors;
pub(crate) mod launch;
pub(crate) mod orchestrator;
pub(crate) mod signals;
pub(crate) mod state;

pub use errors::LaunchError;
pub use launch::{ConfigLoader, SystemConfigLoader, run_daemon};
pub use orchestrator::{ProcessExit, ShutdownOrchestrator, SystemExit};
pub use signals::{ShutdownError, SignalSource, SystemSignals, TrappedSignal};
pub use state::{ShutdownLatch, ShutdownState};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
