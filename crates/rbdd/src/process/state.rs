//! Process-wide shutdown state machine.

use std::sync::atomic::{AtomicU8, Ordering};

/// Phase of the process shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Serving normally.
    Running,
    /// Teardown has started.
    ShuttingDown,
    /// Teardown has finished; the process is about to exit.
    Stopped,
}

impl ShutdownState {
    const fn encode(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::ShuttingDown => 1,
            Self::Stopped => 2,
        }
    }

    const fn decode(raw: u8) -> Self {
        match raw {
            0 => Self::Running,
            1 => Self::ShuttingDown,
            _ => Self::Stopped,
        }
    }
}

/// Latch moving once through `Running → ShuttingDown → Stopped`.
///
/// Each transition succeeds for exactly one caller, which is what gates the
/// teardown effects.
#[derive(Debug)]
pub struct ShutdownLatch {
    state: AtomicU8,
}

impl Default for ShutdownLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownLatch {
    /// Creates a latch in the [`ShutdownState::Running`] state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ShutdownState::Running.encode()),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ShutdownState {
        ShutdownState::decode(self.state.load(Ordering::Acquire))
    }

    /// Moves `Running → ShuttingDown`; returns `false` if shutdown already
    /// began.
    #[must_use]
    pub fn begin(&self) -> bool {
        self.transition(ShutdownState::Running, ShutdownState::ShuttingDown)
    }

    /// Moves `ShuttingDown → Stopped`; returns `false` from any other state.
    #[must_use]
    pub fn finish(&self) -> bool {
        self.transition(ShutdownState::ShuttingDown, ShutdownState::Stopped)
    }

    fn transition(&self, from: ShutdownState, to: ShutdownState) -> bool {
        self.state
            .compare_exchange(from.encode(), to.encode(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
