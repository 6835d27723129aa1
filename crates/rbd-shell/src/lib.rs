//! External command execution and output parsing for the RBD plugin.
//!
//! Storage drivers shell out to Ceph and filesystem tooling (`rbd`, `mount`,
//! `mkfs.xfs`, ...) and interpret the text those tools print. This crate
//! provides the two halves of that workflow:
//!
//! - [`CommandRunner`] runs a program and returns a [`CommandResult`] that
//!   carries the trimmed standard output together with any execution error.
//!   [`CommandRunner::run_with_timeout`] races the command against a deadline
//!   and kills the command's process group when the deadline wins.
//! - [`grep_lines`] and [`regexp_lines`] filter captured output line by line.
//!   Bad patterns never escape as errors; they are logged and produce an
//!   empty result.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use rbd_shell::{CommandRunner, regexp_lines};
//!
//! let runner = CommandRunner::new(false);
//! let result = runner
//!     .run_with_timeout(Duration::from_secs(30), "rbd", ["showmapped"])
//!     .expect("command finished before the deadline");
//! for line in regexp_lines(result.output(), r"^(\d+)\s+(\S+)\s+(\S+)") {
//!     println!("pool={} image={}", line.group(2).unwrap_or(""), line.group(3).unwrap_or(""));
//! }
//! ```

pub mod error;
pub mod lines;
pub mod runner;

pub use self::error::{CommandError, PatternError, RunError};
pub use self::lines::{MatchedLine, grep_lines, regexp_lines};
pub use self::runner::{CommandResult, CommandRunner, DEFAULT_TIMEOUT};
