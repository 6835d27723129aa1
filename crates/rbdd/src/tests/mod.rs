//! Test suites for the plugin daemon runtime.

mod shutdown_behaviour;
pub(crate) mod support;
