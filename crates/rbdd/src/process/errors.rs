//! Defines the unified error surface for daemon launch and supervision.

use std::io;
use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use crate::logging::LogError;
use crate::telemetry::TelemetryError;

use super::signals::ShutdownError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The log destination could not be attached.
    #[error("failed to set up logging: {source}")]
    Logging {
        /// Underlying log lifecycle error.
        #[source]
        source: LogError,
    },
    /// Signal handlers could not be installed.
    #[error("failed to trap signals: {source}")]
    Signals {
        /// Underlying signal error.
        #[source]
        source: ShutdownError,
    },
    /// The shutdown listener thread could not be started.
    #[error("failed to start shutdown listener: {source}")]
    Orchestrator {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The shutdown listener thread panicked.
    #[error("shutdown listener panicked")]
    OrchestratorPanicked,
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<LogError> for LaunchError {
    fn from(source: LogError) -> Self {
        Self::Logging { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Signals { source }
    }
}
