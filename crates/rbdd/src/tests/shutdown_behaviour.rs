//! Behavioural tests covering signal-driven teardown of a launched daemon.

use std::cell::RefCell;
use std::fs;
use std::sync::Arc;
use std::sync::mpsc::{self, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::process::launch::{LaunchPlan, run_daemon_with};
use crate::process::{
    ConfigLoader, LaunchError, ShutdownOrchestrator, ShutdownState, TrappedSignal,
};

use super::support::{
    ChannelSignals, RecordingDriver, RecordingDriverFactory, RecordingExit, TestConfigLoader,
};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

type StepResult = Result<(), String>;
type LaunchOutcome = Result<ShutdownOrchestrator<RecordingDriver, RecordingExit>, LaunchError>;

struct ShutdownWorld {
    loader: Arc<dyn ConfigLoader>,
    log_file: Utf8PathBuf,
    driver: RecordingDriver,
    exit: RecordingExit,
    signals: Arc<ChannelSignals>,
    sender: Option<SyncSender<TrappedSignal>>,
    handle: Option<JoinHandle<LaunchOutcome>>,
    outcome: Option<LaunchOutcome>,
}

impl ShutdownWorld {
    fn new() -> Self {
        let loader = TestConfigLoader::new();
        let log_file = loader.log_dir().join("rbd-docker-plugin.log");
        let (sender, receiver) = mpsc::sync_channel(TrappedSignal::ALL.len());
        Self {
            loader: Arc::new(loader),
            log_file,
            driver: RecordingDriver::default(),
            exit: RecordingExit::default(),
            signals: Arc::new(ChannelSignals::new(receiver)),
            sender: Some(sender),
            handle: None,
            outcome: None,
        }
    }

    fn start(&mut self) -> StepResult {
        if self.handle.is_some() {
            return Err("daemon already started".to_owned());
        }
        let loader = Arc::clone(&self.loader);
        let signals = Arc::clone(&self.signals);
        let drivers = RecordingDriverFactory::new(self.driver.clone());
        let exit = self.exit.clone();
        self.handle = Some(thread::spawn(move || {
            run_daemon_with(LaunchPlan {
                loader: &*loader,
                drivers,
                signals: &*signals,
                exit,
            })
        }));
        Ok(())
    }

    fn send(&self, signal: TrappedSignal) -> StepResult {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| "signal channel already closed".to_owned())?;
        sender.send(signal).map_err(|error| error.to_string())
    }

    fn stop(&mut self) -> StepResult {
        drop(self.sender.take());
        let handle = self
            .handle
            .take()
            .ok_or_else(|| "daemon not running".to_owned())?;
        let outcome = handle
            .join()
            .map_err(|_| "daemon thread panicked".to_owned())?;
        self.outcome = Some(outcome);
        Ok(())
    }

    fn wait_for_log_file(&self) -> StepResult {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        while Instant::now() < deadline {
            if self.log_file.exists() {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Err(format!("log file {} never appeared", self.log_file))
    }

    fn orchestrator(&self) -> Result<&ShutdownOrchestrator<RecordingDriver, RecordingExit>, String> {
        match self.outcome.as_ref() {
            Some(Ok(orchestrator)) => Ok(orchestrator),
            Some(Err(error)) => Err(format!("launch failed: {error}")),
            None => Err("daemon has not stopped".to_owned()),
        }
    }
}

#[fixture]
fn world() -> RefCell<ShutdownWorld> {
    RefCell::new(ShutdownWorld::new())
}

#[given("a daemon with a live storage driver")]
fn given_live_driver(world: &RefCell<ShutdownWorld>) {
    world.borrow_mut().driver = RecordingDriver::live();
}

#[given("a daemon with an idle storage driver")]
fn given_idle_driver(world: &RefCell<ShutdownWorld>) {
    world.borrow_mut().driver = RecordingDriver::default();
}

#[given("a daemon whose log directory is missing")]
fn given_missing_log_dir(world: &RefCell<ShutdownWorld>) {
    world.borrow_mut().loader = Arc::new(TestConfigLoader::new().with_missing_log_dir());
}

#[when("the daemon starts")]
fn when_daemon_starts(world: &RefCell<ShutdownWorld>) -> StepResult {
    world.borrow_mut().start()
}

#[when("the daemon receives SIGTERM")]
fn when_sigterm(world: &RefCell<ShutdownWorld>) -> StepResult {
    world.borrow().send(TrappedSignal::Terminate)
}

#[when("the daemon receives SIGINT")]
fn when_sigint(world: &RefCell<ShutdownWorld>) -> StepResult {
    world.borrow().send(TrappedSignal::Interrupt)
}

#[when("the daemon receives SIGHUP")]
fn when_sighup(world: &RefCell<ShutdownWorld>) -> StepResult {
    world.borrow().send(TrappedSignal::Hangup)
}

#[when("the log file is rotated away")]
fn when_log_rotated(world: &RefCell<ShutdownWorld>) -> StepResult {
    let world = world.borrow();
    world.wait_for_log_file()?;
    let rotated = format!("{}.1", world.log_file);
    fs::rename(&world.log_file, rotated).map_err(|error| error.to_string())
}

#[when("the daemon stops")]
fn when_daemon_stops(world: &RefCell<ShutdownWorld>) -> StepResult {
    world.borrow_mut().stop()
}

#[then("the log file is recreated")]
fn then_log_recreated(world: &RefCell<ShutdownWorld>) -> StepResult {
    world.borrow().wait_for_log_file()
}

#[then("the storage driver was shut down once")]
fn then_driver_shut_down_once(world: &RefCell<ShutdownWorld>) {
    assert_eq!(world.borrow().driver.shutdown_count(), 1);
}

#[then("the storage driver was not shut down")]
fn then_driver_untouched(world: &RefCell<ShutdownWorld>) {
    assert_eq!(world.borrow().driver.shutdown_count(), 0);
}

#[then("the process exited once with status zero")]
fn then_exited_once(world: &RefCell<ShutdownWorld>) {
    assert_eq!(world.borrow().exit.codes(), vec![0]);
}

#[then("the log file is closed")]
fn then_log_closed(world: &RefCell<ShutdownWorld>) -> StepResult {
    let world = world.borrow();
    let orchestrator = world.orchestrator()?;
    assert!(!orchestrator.log_handle().is_attached());
    assert_eq!(orchestrator.state(), ShutdownState::Stopped);
    Ok(())
}

#[then("the launch failed with a logging error")]
fn then_launch_failed(world: &RefCell<ShutdownWorld>) {
    let world = world.borrow();
    match world.outcome.as_ref() {
        Some(Err(LaunchError::Logging { .. })) => {}
        Some(Err(other)) => panic!("unexpected launch error: {other}"),
        Some(Ok(_)) => panic!("launch should have failed"),
        None => panic!("daemon has not stopped"),
    }
}

#[then("no signal listener was installed")]
fn then_no_listener(world: &RefCell<ShutdownWorld>) {
    assert_eq!(world.borrow().signals.subscriptions(), 0);
}

#[scenario(
    path = "tests/features/shutdown.feature",
    name = "Termination releases the driver exactly once"
)]
fn termination_releases_driver(world: RefCell<ShutdownWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/shutdown.feature",
    name = "Hangup reopens a rotated log file"
)]
fn hangup_reopens_log(world: RefCell<ShutdownWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/shutdown.feature",
    name = "An idle driver is left alone"
)]
fn idle_driver_left_alone(world: RefCell<ShutdownWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/shutdown.feature",
    name = "A missing log directory aborts startup"
)]
fn missing_log_dir_aborts(world: RefCell<ShutdownWorld>) {
    drop(world);
}
