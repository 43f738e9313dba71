//! Environment abstraction for the coordination core.
//!
//! The core never reads the system clock or spawns tasks itself. Production
//! wires in [`crate::engine::TokioEnvironment`], whose timers post back into
//! the engine's event queue; tests drive a manual clock and fire timers by
//! hand.

use std::fmt;
use std::time::Duration;

/// Identifies a scheduled callback. Delivered back to
/// [`crate::coordinator::Coordinator::on_timer`] when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Reconnect grace period for a disconnected public user.
    PendingRemoval { name: String, generation: u64 },
}

/// Time and timers.
pub trait Environment {
    /// Wall-clock milliseconds since the unix epoch.
    ///
    /// Must never go backwards within one process.
    fn now_millis(&self) -> i64;

    /// Arrange for `key` to be delivered to the coordinator after `delay`.
    ///
    /// A fired timer is re-entered through the same event queue as client
    /// events, so the handler must re-validate state before acting.
    fn schedule(&mut self, key: TimerKey, delay: Duration) -> TimerHandle;
}

/// Cancels a scheduled timer. Dropping the handle leaves the timer armed.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to cancel.
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}
