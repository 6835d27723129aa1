//! Synchronous and deadline-bounded execution of external commands.
//!
//! [`CommandRunner::run`] blocks for the full lifetime of the child.
//! [`CommandRunner::run_with_timeout`] hands the child to a single worker
//! thread and races the worker's hand-off channel against the deadline. Only
//! one side of the race ever delivers a value: when the deadline wins, the
//! child's process group is killed and the worker's late result is dropped
//! after it has reaped the child.

use std::ffi::{OsStr, OsString};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, ExitStatus, Output, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, warn};

use rbd_config::{Config, DEFAULT_SHELL_TIMEOUT_SECS};

use crate::error::{CommandError, RunError};

/// Tracing target for command execution.
const SHELL_TARGET: &str = "rbd_shell::runner";

/// Name given to the thread that waits on a bounded command.
const WORKER_NAME: &str = "rbd-shell-worker";

/// Deadline applied by [`CommandRunner::run_with_default_timeout`] unless the
/// runner was configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_SHELL_TIMEOUT_SECS);

/// How long a timed-out command's worker may take to reap the killed child.
const REAP_GRACE: Duration = Duration::from_secs(5);

/// Outcome of one command invocation.
///
/// The trimmed standard output and the execution error travel together, so a
/// caller never pairs output from one invocation with an error from another.
/// Output is kept even when the command fails.
#[derive(Debug, Clone)]
#[must_use]
pub struct CommandResult {
    output: String,
    error: Option<CommandError>,
}

impl CommandResult {
    /// Builds the result of a command that exited successfully.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: None,
        }
    }

    /// Builds the result of a command that failed.
    pub fn failed(output: impl Into<String>, error: CommandError) -> Self {
        Self {
            output: output.into(),
            error: Some(error),
        }
    }

    /// Trimmed standard output of the command.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Execution error, if the command did not succeed.
    #[must_use]
    pub const fn error(&self) -> Option<&CommandError> {
        self.error.as_ref()
    }

    /// Whether the command ran and exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Splits the result into its output and error.
    #[must_use]
    pub fn into_parts(self) -> (String, Option<CommandError>) {
        (self.output, self.error)
    }

    /// Converts into a `Result`, discarding the output of failed commands.
    ///
    /// # Errors
    ///
    /// Returns the [`CommandError`] when the command failed.
    pub fn into_result(self) -> Result<String, CommandError> {
        match self.error {
            None => Ok(self.output),
            Some(error) => Err(error),
        }
    }
}

/// Runs external programs and captures their trimmed standard output.
///
/// The runner is a small `Copy` value holding the debug flag and the default
/// deadline, so it can be handed to every component that shells out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRunner {
    debug: bool,
    default_timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(false)
    }
}

impl CommandRunner {
    /// Creates a runner using [`DEFAULT_TIMEOUT`].
    ///
    /// With `debug` set, arguments and the stderr of failed commands are
    /// logged at `debug` level.
    #[must_use]
    pub const fn new(debug: bool) -> Self {
        Self {
            debug,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a runner from the daemon configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self::new(config.debug_enabled()).with_default_timeout(config.shell_timeout())
    }

    /// Replaces the deadline used by [`Self::run_with_default_timeout`].
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Deadline used by [`Self::run_with_default_timeout`].
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Whether verbose diagnostics are enabled.
    #[must_use]
    pub const fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Runs `program` to completion and returns its trimmed standard output.
    ///
    /// Standard error is never part of the result. A missing executable, a
    /// non-zero exit or death by signal is reported through
    /// [`CommandResult::error`].
    pub fn run<I, S>(&self, program: &str, args: I) -> CommandResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args = collect_args(args);
        debug!(target: SHELL_TARGET, program, ?args, "running command");
        let mut command = build_command(program, &args);
        let result = match command.output() {
            Ok(output) => self.interpret(program, output),
            Err(source) => CommandResult::failed(String::new(), spawn_error(program, source)),
        };
        log_outcome(program, &result);
        result
    }

    /// Runs `program` with [`Self::default_timeout`] as the deadline.
    ///
    /// # Errors
    ///
    /// See [`Self::run_with_timeout`].
    pub fn run_with_default_timeout<I, S>(
        &self,
        program: &str,
        args: I,
    ) -> Result<CommandResult, RunError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_with_timeout(self.default_timeout, program, args)
    }

    /// Runs `program`, giving up once `timeout` has elapsed.
    ///
    /// When the command finishes first, the result is exactly what
    /// [`Self::run`] would have returned. When the deadline fires first, the
    /// command's process group is killed and reaped before returning.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidTimeout`] for a zero `timeout` without
    /// spawning anything, and [`RunError::TimedOut`] when the deadline wins.
    pub fn run_with_timeout<I, S>(
        &self,
        timeout: Duration,
        program: &str,
        args: I,
    ) -> Result<CommandResult, RunError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        if timeout.is_zero() {
            return Err(RunError::InvalidTimeout { timeout });
        }
        let args = collect_args(args);
        if self.debug {
            debug!(
                target: SHELL_TARGET,
                program,
                ?args,
                timeout_ms = duration_millis(timeout),
                "running command with timeout"
            );
        }

        let mut command = build_command(program, &args);
        // A dedicated process group lets a timeout kill the whole pipeline,
        // including grandchildren still holding the output pipes.
        command.process_group(0);
        let child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                let result = CommandResult::failed(String::new(), spawn_error(program, source));
                log_outcome(program, &result);
                return Ok(result);
            }
        };
        let pid = child.id();

        let (sender, receiver) = mpsc::sync_channel(1);
        let runner = *self;
        let owned_program = program.to_owned();
        let spawned = thread::Builder::new()
            .name(WORKER_NAME.to_owned())
            .spawn(move || {
                let result = match child.wait_with_output() {
                    Ok(output) => runner.interpret(&owned_program, output),
                    Err(source) => CommandResult::failed(
                        String::new(),
                        CommandError::Wait {
                            program: owned_program.clone(),
                            source: Arc::new(source),
                        },
                    ),
                };
                // The receiver is gone when the deadline already fired.
                drop(sender.send(result));
            });
        if let Err(source) = spawned {
            terminate_group(program, pid);
            return Ok(CommandResult::failed(
                String::new(),
                CommandError::WorkerSpawn {
                    program: program.to_owned(),
                    source: Arc::new(source),
                },
            ));
        }

        match receiver.recv_timeout(timeout) {
            Ok(result) => {
                log_outcome(program, &result);
                Ok(result)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    target: SHELL_TARGET,
                    program,
                    pid,
                    timeout_ms = duration_millis(timeout),
                    "command timed out, killing process group"
                );
                terminate_group(program, pid);
                await_reap(program, &receiver);
                Err(RunError::TimedOut {
                    program: program.to_owned(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Ok(CommandResult::failed(
                String::new(),
                CommandError::WorkerLost {
                    program: program.to_owned(),
                },
            )),
        }
    }

    /// Turns captured process output into a [`CommandResult`].
    fn interpret(&self, program: &str, output: Output) -> CommandResult {
        let stdout = trim_output(&output.stdout);
        match exit_failure(program, output.status) {
            None => CommandResult::success(stdout),
            Some(error) => {
                if self.debug {
                    debug!(
                        target: SHELL_TARGET,
                        program,
                        %error,
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "command failed"
                    );
                }
                CommandResult::failed(stdout, error)
            }
        }
    }
}

fn collect_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect()
}

fn build_command(program: &str, args: &[OsString]) -> Command {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

fn trim_output(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout).trim().to_owned()
}

fn spawn_error(program: &str, source: std::io::Error) -> CommandError {
    CommandError::Spawn {
        program: program.to_owned(),
        source: Arc::new(source),
    }
}

fn exit_failure(program: &str, status: ExitStatus) -> Option<CommandError> {
    if status.success() {
        return None;
    }
    let program = program.to_owned();
    match (status.code(), status.signal()) {
        (Some(code), _) => Some(CommandError::NonZeroExit {
            program,
            status: code,
        }),
        (None, Some(signal)) => Some(CommandError::Signalled { program, signal }),
        (None, None) => Some(CommandError::NonZeroExit {
            program,
            status: -1,
        }),
    }
}

fn log_outcome(program: &str, result: &CommandResult) {
    debug!(
        target: SHELL_TARGET,
        program,
        success = result.is_success(),
        output_bytes = result.output().len(),
        "command finished"
    );
}

/// Kills every process in the group led by `pid`.
fn terminate_group(program: &str, pid: u32) {
    let Ok(raw) = i32::try_from(pid) else {
        warn!(target: SHELL_TARGET, program, pid, "pid out of range, cannot kill");
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(target: SHELL_TARGET, program, pid, "process group killed"),
        Err(Errno::ESRCH) => {
            debug!(target: SHELL_TARGET, program, pid, "process group already exited");
        }
        Err(errno) => warn!(
            target: SHELL_TARGET,
            program,
            pid,
            %errno,
            "failed to kill process group"
        ),
    }
}

/// Waits for the worker to reap a killed child, then discards its result.
fn await_reap(program: &str, receiver: &Receiver<CommandResult>) {
    if let Err(RecvTimeoutError::Timeout) = receiver.recv_timeout(REAP_GRACE) {
        warn!(
            target: SHELL_TARGET,
            program,
            grace_ms = duration_millis(REAP_GRACE),
            "killed command was not reaped within the grace period"
        );
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
