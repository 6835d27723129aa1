use camino::Utf8PathBuf;

/// Docker plugin name used for the socket and log file names.
pub const DEFAULT_PLUGIN_NAME: &str = "rbd";

/// Directory receiving the plugin log file.
pub const DEFAULT_LOG_DIR: &str = "/var/log";

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Seconds an external management command may run before it is killed.
pub const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 2 * 60;

/// Legacy switch that forces debug mode when set to `1`.
pub const DEBUG_ENV_VAR: &str = "RBD_DOCKER_PLUGIN_DEBUG";

/// Owned plugin name used where allocation is required (e.g. serde).
#[must_use]
pub fn default_plugin_name() -> String {
    DEFAULT_PLUGIN_NAME.to_owned()
}

/// Owned log directory used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_LOG_DIR)
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Default command timeout in seconds.
#[must_use]
pub const fn default_shell_timeout_secs() -> u64 {
    DEFAULT_SHELL_TIMEOUT_SECS
}
