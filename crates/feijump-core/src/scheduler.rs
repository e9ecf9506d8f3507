//! Frame-driven delayed-callback scheduler.
//!
//! Timers carry a payload instead of a closure: `advance` hands the payloads of
//! every timer that came due back to the owner, which dispatches them against
//! its own state on the frame thread. Pausing freezes every pending timer so
//! wall-clock time spent paused never counts toward expiry.

use serde::{Deserialize, Serialize};

/// Cancelable handle returned by [`Scheduler::delayed_call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct PendingTimer<T> {
    handle: TimerHandle,
    remaining_ms: f32,
    payload: T,
}

/// Pausable one-shot timers keyed by [`TimerHandle`].
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    timers: Vec<PendingTimer<T>>,
    next_handle: u64,
    paused: bool,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_handle: 1,
            paused: false,
        }
    }

    /// Schedule `payload` to fire after `delay_ms` of unpaused time.
    pub fn delayed_call(&mut self, delay_ms: f32, payload: T) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        let remaining_ms = if delay_ms.is_finite() {
            delay_ms.max(0.0)
        } else {
            0.0
        };
        self.timers.push(PendingTimer {
            handle,
            remaining_ms,
            payload,
        });
        handle
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was canceled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.handle != handle);
        self.timers.len() != before
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Milliseconds left on a pending timer.
    pub fn remaining(&self, handle: TimerHandle) -> Option<f32> {
        self.timers
            .iter()
            .find(|t| t.handle == handle)
            .map(|t| t.remaining_ms)
    }

    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Advance the clock by `dt_ms` and return the payloads that came due,
    /// earliest deadline first (ties in scheduling order). No-op while paused.
    pub fn advance(&mut self, dt_ms: f32) -> Vec<T> {
        if self.paused || !dt_ms.is_finite() || dt_ms < 0.0 {
            return Vec::new();
        }

        let mut due = Vec::new();
        let mut kept = Vec::with_capacity(self.timers.len());
        for mut timer in self.timers.drain(..) {
            timer.remaining_ms -= dt_ms;
            if timer.remaining_ms <= 0.0 {
                due.push(timer);
            } else {
                kept.push(timer);
            }
        }
        self.timers = kept;

        due.sort_by(|a, b| {
            a.remaining_ms
                .total_cmp(&b.remaining_ms)
                .then(a.handle.cmp(&b.handle))
        });
        due.into_iter().map(|t| t.payload).collect()
    }
}
