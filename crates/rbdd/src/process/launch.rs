//! Supervises daemon launch sequencing.

use std::sync::Arc;

use ortho_config::OrthoError;
use tracing::info;

use rbd_config::Config;
use rbd_shell::CommandRunner;

use crate::driver::{DriverFactory, PlaceholderDriverFactory};
use crate::logging::{LogLifecycle, LogSink};
use crate::telemetry;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::orchestrator::{ProcessExit, ShutdownOrchestrator, SystemExit};
use super::signals::{SignalSource, SystemSignals};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    ///
    /// # Errors
    ///
    /// Returns the `ortho_config` error when any configuration layer fails.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

impl<T: ConfigLoader + ?Sized> ConfigLoader for &T {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        (**self).load()
    }
}

/// Loader that delegates to [`rbd_config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        rbd_config::load()
    }
}

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, F, S, E> {
    pub(crate) loader: L,
    pub(crate) drivers: F,
    pub(crate) signals: S,
    pub(crate) exit: E,
}

/// Runs the daemon using the production collaborators.
///
/// Returns only when the process was not exited by a termination signal.
///
/// # Errors
///
/// Returns a [`LaunchError`] when any startup step fails.
pub fn run_daemon() -> Result<(), LaunchError> {
    let plan = LaunchPlan {
        loader: SystemConfigLoader,
        drivers: PlaceholderDriverFactory,
        signals: SystemSignals,
        exit: SystemExit,
    };
    run_daemon_with(plan).map(drop)
}

/// Runs the daemon with injected collaborators.
///
/// Blocks until the signal channel closes and hands back the orchestrator so
/// callers can inspect the final state.
pub(crate) fn run_daemon_with<L, F, S, E>(
    plan: LaunchPlan<L, F, S, E>,
) -> Result<ShutdownOrchestrator<F::Driver, E>, LaunchError>
where
    L: ConfigLoader,
    F: DriverFactory,
    S: SignalSource,
    E: ProcessExit + 'static,
{
    let LaunchPlan {
        loader,
        drivers,
        signals,
        exit,
    } = plan;

    let config = loader.load()?;
    let sink = LogSink::new();
    telemetry::initialise(&config, &sink)?;
    let lifecycle = LogLifecycle::from_config(sink, &config);
    let handle = lifecycle.setup()?;
    info!(
        target: PROCESS_TARGET,
        version = env!("CARGO_PKG_VERSION"),
        plugin = config.name(),
        debug = config.debug_enabled(),
        log = %lifecycle.destination().display(),
        shell_timeout_secs = config.shell_timeout_secs,
        "starting daemon runtime"
    );

    let driver = drivers.build(&config, CommandRunner::from_config(&config));
    let receiver = signals.subscribe()?;
    let orchestrator = ShutdownOrchestrator::new(lifecycle, handle, driver, exit);
    let listener = orchestrator
        .spawn(receiver)
        .map_err(|source| LaunchError::Orchestrator { source })?;
    listener
        .join()
        .map_err(|_| LaunchError::OrchestratorPanicked)
}
