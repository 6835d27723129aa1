//! Shared configuration for the RBD Docker volume plugin daemon.
//!
//! Configuration is resolved once at startup into an immutable [`Config`]
//! value and passed explicitly to every component that needs it. Values are
//! layered by `ortho_config`: built-in defaults, then an optional TOML file,
//! then `RBD_PLUGIN_*` environment variables, then command-line flags. The
//! legacy `RBD_DOCKER_PLUGIN_DEBUG=1` switch is folded into
//! [`Config::debug`] by [`load`].

use std::env;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;

pub use defaults::{
    DEBUG_ENV_VAR, DEFAULT_LOG_DIR, DEFAULT_LOG_FILTER, DEFAULT_PLUGIN_NAME,
    DEFAULT_SHELL_TIMEOUT_SECS, default_log_dir, default_log_filter_string, default_log_format,
    default_plugin_name, default_shell_timeout_secs,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Suffix appended to the plugin name to form the log file name.
const LOG_FILE_SUFFIX: &str = "-docker-plugin.log";

/// Runtime configuration for the plugin daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "RBD_PLUGIN")]
pub struct Config {
    /// Keeps logs on stderr and enables verbose command diagnostics.
    #[serde(default)]
    pub debug: bool,
    /// Docker plugin name, used for the log file name.
    #[serde(default = "default_plugin_name")]
    pub name: String,
    /// Directory that receives the plugin log file.
    #[serde(default = "default_log_dir")]
    pub log_dir: Utf8PathBuf,
    /// `tracing` filter expression applied to daemon output.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format of log lines.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Default bound, in seconds, for external management commands.
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            name: default_plugin_name(),
            log_dir: default_log_dir(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            shell_timeout_secs: default_shell_timeout_secs(),
        }
    }
}

impl Config {
    /// Whether debug mode is active.
    #[must_use]
    pub const fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Docker plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory receiving the log file.
    #[must_use]
    pub fn log_dir(&self) -> &Utf8Path {
        &self.log_dir
    }

    /// Filter expression for the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for log lines.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Default timeout for external commands.
    #[must_use]
    pub const fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs)
    }

    /// Full path of the plugin log file: `<log_dir>/<name>-docker-plugin.log`.
    #[must_use]
    pub fn log_file_path(&self) -> Utf8PathBuf {
        self.log_dir.join(format!("{}{LOG_FILE_SUFFIX}", self.name))
    }

    /// Forces debug mode when the legacy switch carries the value `1`.
    #[must_use]
    pub fn with_legacy_debug(mut self, value: Option<&OsStr>) -> Self {
        if value == Some(OsStr::new("1")) {
            self.debug = true;
        }
        self
    }
}

/// Loads configuration from every layer and applies the legacy debug switch.
///
/// # Errors
///
/// Returns the aggregated `ortho_config` error when any layer fails to parse.
pub fn load() -> Result<Config, Arc<OrthoError>> {
    let config = Config::load()?;
    Ok(config.with_legacy_debug(env::var_os(DEBUG_ENV_VAR).as_deref()))
}
