//! Coalescing provider-switch queue.
//!
//! Each instance owns one [`SwitchSlot`]: a queue of depth one. A new
//! request overwrites the pending one, so a burst of settings updates
//! results in at most one switch after the one already running. At most one
//! drain job per instance is ever scheduled on the worker pool.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::ProviderId;

/// What [`SwitchSlot::request`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Request {
    /// Target already current or queued; nothing changed.
    Unchanged,
    /// A queued switch away from the current provider was dropped.
    Cancelled,
    /// Pending target replaced; the scheduled drain job will pick it up.
    Queued,
    /// Pending target set and the caller must spawn a drain job.
    Spawn,
    /// The slot is closed.
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SlotSnapshot {
    pub pending: Option<ProviderId>,
    pub in_flight: Option<ProviderId>,
    /// Provider loaded by the last successful switch.
    pub current: Option<ProviderId>,
    /// Target of the last switch, if it failed.
    pub failed: Option<ProviderId>,
    pub closed: bool,
}

impl SlotSnapshot {
    pub fn is_switching(&self) -> bool {
        self.pending.is_some() || self.in_flight.is_some()
    }
}

#[derive(Default)]
struct SlotState {
    snapshot: SlotSnapshot,
    scheduled: bool,
}

#[derive(Default)]
pub(crate) struct SwitchSlot {
    state: Mutex<SlotState>,
    idle: Condvar,
}

impl SwitchSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for `target` to become the current provider.
    pub fn request(&self, target: ProviderId) -> Request {
        let mut state = self.lock();
        let s = &mut state.snapshot;
        if s.closed {
            return Request::Closed;
        }

        let effective = s.pending.or(s.in_flight).or(s.current);
        if effective == Some(target) {
            return Request::Unchanged;
        }
        if s.in_flight.is_none() && s.current == Some(target) {
            s.pending = None;
            return Request::Cancelled;
        }

        s.pending = Some(target);
        if state.scheduled {
            Request::Queued
        } else {
            state.scheduled = true;
            Request::Spawn
        }
    }

    /// Take the pending target for the drain job. `None` ends the job.
    pub fn begin(&self) -> Option<ProviderId> {
        let mut state = self.lock();
        if state.snapshot.closed {
            state.snapshot.pending = None;
        }
        match state.snapshot.pending.take() {
            Some(target) => {
                state.snapshot.in_flight = Some(target);
                Some(target)
            }
            None => {
                state.scheduled = false;
                self.idle.notify_all();
                None
            }
        }
    }

    /// Record the outcome of the switch started by [`begin`](Self::begin).
    pub fn finish(&self, target: ProviderId, loaded: bool) {
        let mut state = self.lock();
        let s = &mut state.snapshot;
        s.in_flight = None;
        if loaded {
            s.current = Some(target);
            s.failed = None;
        } else {
            s.current = None;
            s.failed = Some(target);
        }
    }

    /// Drop any pending request and refuse new ones.
    pub fn close(&self) {
        let mut state = self.lock();
        state.snapshot.closed = true;
        state.snapshot.pending = None;
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        self.lock().snapshot
    }

    /// Block until no drain job is scheduled. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .idle
            .wait_timeout_while(state, timeout, |s| s.scheduled)
            .unwrap_or_else(|e| e.into_inner());
        !state.scheduled
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
