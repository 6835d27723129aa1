//! Test doubles shared by the daemon unit and behaviour suites.

use std::ffi::OsString;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use rbd_config::Config;
use rbd_shell::CommandRunner;

use crate::driver::{DriverError, DriverFactory, StorageDriver};
use crate::process::{ConfigLoader, ProcessExit, ShutdownError, SignalSource, TrappedSignal};

/// Driver that counts shutdown calls.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    live: bool,
    fail: bool,
    shutdowns: Arc<AtomicUsize>,
}

impl RecordingDriver {
    /// Driver holding live resources.
    pub fn live() -> Self {
        Self {
            live: true,
            ..Self::default()
        }
    }

    /// Live driver whose shutdown fails.
    pub fn failing() -> Self {
        Self {
            live: true,
            fail: true,
            ..Self::default()
        }
    }

    /// Number of shutdown calls observed by this driver and its clones.
    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl StorageDriver for RecordingDriver {
    fn holds_live_resources(&self) -> bool {
        self.live
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DriverError::new("cluster connection already closed"));
        }
        self.live = false;
        Ok(())
    }
}

/// Exit hook that records requested exit codes instead of exiting.
#[derive(Debug, Clone, Default)]
pub struct RecordingExit {
    codes: Arc<Mutex<Vec<i32>>>,
}

impl RecordingExit {
    /// Exit codes requested so far.
    pub fn codes(&self) -> Vec<i32> {
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProcessExit for RecordingExit {
    fn exit(&self, code: i32) {
        self.codes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(code);
    }
}

/// Factory handing out clones of one recording driver.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriverFactory {
    driver: RecordingDriver,
    runners: Arc<Mutex<Vec<CommandRunner>>>,
}

impl RecordingDriverFactory {
    /// Factory producing `driver`.
    pub fn new(driver: RecordingDriver) -> Self {
        Self {
            driver,
            runners: Arc::default(),
        }
    }

    /// Runners passed to [`DriverFactory::build`].
    pub fn runners(&self) -> Vec<CommandRunner> {
        self.runners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DriverFactory for RecordingDriverFactory {
    type Driver = RecordingDriver;

    fn build(&self, _config: &Config, shell: CommandRunner) -> Self::Driver {
        self.runners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(shell);
        self.driver.clone()
    }
}

/// Signal source replaying a prepared channel.
#[derive(Debug, Default)]
pub struct ChannelSignals {
    receiver: Mutex<Option<Receiver<TrappedSignal>>>,
    subscriptions: AtomicUsize,
}

impl ChannelSignals {
    /// Source delivering whatever is sent into `receiver`'s channel.
    pub fn new(receiver: Receiver<TrappedSignal>) -> Self {
        Self {
            receiver: Mutex::new(Some(receiver)),
            subscriptions: AtomicUsize::new(0),
        }
    }

    /// Number of times the daemon subscribed.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl SignalSource for ChannelSignals {
    fn subscribe(&self) -> Result<Receiver<TrappedSignal>, ShutdownError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ShutdownError::Install {
                source: std::io::Error::other("signal channel already taken"),
            })
    }
}

/// Loader that points the log directory at a temporary directory.
#[derive(Debug)]
pub struct TestConfigLoader {
    log_dir: TempDir,
    debug: bool,
}

impl TestConfigLoader {
    /// Loader for a non-debug daemon logging into a fresh directory.
    pub fn new() -> Self {
        Self {
            log_dir: TempDir::new().expect("failed to create temporary log directory"),
            debug: false,
        }
    }

    /// Switches the loaded configuration to debug mode.
    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Directory receiving the log file.
    pub fn log_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.log_dir.path().to_path_buf())
            .expect("temporary log directory was not valid UTF-8")
    }

    /// Points the log directory at a path that does not exist.
    pub fn with_missing_log_dir(self) -> MissingDirLoader {
        MissingDirLoader { inner: self }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            debug: self.debug,
            log_dir: self.log_dir(),
            ..Config::default()
        })
    }
}

/// Loader whose log directory is missing, making log setup fatal.
#[derive(Debug)]
pub struct MissingDirLoader {
    inner: TestConfigLoader,
}

impl ConfigLoader for MissingDirLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            log_dir: self.inner.log_dir().join("missing"),
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
#[derive(Debug, Default)]
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("rbdd"),
            OsString::from("--shell-timeout-secs"),
            OsString::from("soon"),
        ];
        Config::load_from_iter(args)
    }
}
