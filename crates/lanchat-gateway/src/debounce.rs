//! Reconnect debouncer.
//!
//! Browsers drop and re-open the socket on every network blip. Two things
//! keep that from spamming the room:
//!
//! - a disconnected public user's name is held for a grace period; if the
//!   same name joins again before the timer fires, nobody sees them leave
//! - join announcements for one name are emitted at most once per window

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::dispatcher::ConnId;
use crate::env::{Environment, TimerHandle, TimerKey};
use crate::namespace::Namespace;

#[derive(Debug)]
struct PendingRemoval {
    conn: ConnId,
    generation: u64,
    handle: TimerHandle,
}

#[derive(Debug, Default)]
pub struct ReconnectDebouncer {
    pending: HashMap<String, PendingRemoval>,
    /// (namespace, name) -> expiry of the last announced join, unix millis
    announced: HashMap<(Namespace, String), i64>,
    next_generation: u64,
}

impl ReconnectDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the grace timer for `name`, held by the disconnected `conn`.
    ///
    /// An earlier pending removal for the same name is superseded.
    pub fn schedule_removal<E: Environment>(
        &mut self,
        env: &mut E,
        name: &str,
        conn: ConnId,
        grace: Duration,
    ) -> u64 {
        if let Some(previous) = self.pending.remove(name) {
            previous.handle.cancel();
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        let handle = env.schedule(
            TimerKey::PendingRemoval {
                name: name.to_string(),
                generation,
            },
            grace,
        );
        self.pending.insert(
            name.to_string(),
            PendingRemoval {
                conn,
                generation,
                handle,
            },
        );
        generation
    }

    /// Cancel the grace timer for `name`. Returns the stale connection that
    /// was holding the name, or `None` if nothing was pending.
    pub fn cancel_pending_removal(&mut self, name: &str) -> Option<ConnId> {
        let pending = self.pending.remove(name)?;
        pending.handle.cancel();
        Some(pending.conn)
    }

    /// Claim a fired timer. Returns the connection to finalize, or `None` if
    /// the timer was cancelled or superseded after it was queued.
    pub fn take_fired(&mut self, name: &str, generation: u64) -> Option<ConnId> {
        match self.pending.get(name) {
            Some(pending) if pending.generation == generation => {
                self.pending.remove(name).map(|pending| pending.conn)
            }
            _ => None,
        }
    }

    /// Returns `true` if a join of `name` in `namespace` was already announced
    /// within the trailing `window`. Otherwise records this announcement
    /// with its own expiry and returns `false`.
    pub fn suppress_duplicate_join_announcement(
        &mut self,
        namespace: &Namespace,
        name: &str,
        now: i64,
        window: Duration,
    ) -> bool {
        let key = (namespace.clone(), name.to_string());
        if let Some(&expires_at) = self.announced.get(&key) {
            if now < expires_at {
                debug!("suppressing duplicate join announcement for {} in {}", name, namespace);
                return true;
            }
        }

        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        self.announced.insert(key, now.saturating_add(window_ms));
        false
    }

    /// Forget announcement records whose window has passed.
    pub fn prune_announcements(&mut self, now: i64) {
        self.announced.retain(|_, expires_at| now < *expires_at);
    }
}
