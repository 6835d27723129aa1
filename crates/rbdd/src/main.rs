//! Entry point for the `rbdd` plugin daemon.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match rbdd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(target: "rbdd", %error, "daemon failed to start");
            drop(writeln!(io::stderr().lock(), "rbdd: {error}"));
            ExitCode::FAILURE
        }
    }
}
