//! Virtual clock with fire-once, cancellable timers
//!
//! Time only moves when the owner calls [`Scheduler::advance_to`] or
//! [`Scheduler::advance`]; nothing here reads the wall clock. Due timers come
//! out of [`Scheduler::pop_due`] ordered by due time, then by scheduling order.

use serde::{Deserialize, Serialize};

/// Handle for cancelling a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer<T> {
    id: TimerId,
    due_ms: f64,
    action: T,
}

/// Fire-once timer queue on a virtual millisecond clock
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    now_ms: f64,
    next_id: u64,
    timers: Vec<Timer<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0.0,
            next_id: 0,
            timers: Vec::new(),
        }
    }

    /// Current virtual time (ms)
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Fire `action` after `delay_ms` (negative delays fire immediately)
    pub fn schedule(&mut self, delay_ms: f64, action: T) -> TimerId {
        let due_ms = self.now_ms + delay_ms.max(0.0);
        self.schedule_at(due_ms, action)
    }

    /// Fire `action` at an absolute virtual time (clamped to now)
    pub fn schedule_at(&mut self, due_ms: f64, action: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            due_ms: due_ms.max(self.now_ms),
            action,
        });
        id
    }

    /// Cancel a pending timer; false if it already fired or was cancelled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    /// Cancel every pending timer, returning how many were dropped
    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        self.timers.clear();
        count
    }

    /// Pending timer count
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Earliest pending due time
    pub fn next_due(&self) -> Option<f64> {
        self.timers
            .iter()
            .map(|t| t.due_ms)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Move the clock forward to `time_ms` (never backwards)
    pub fn advance_to(&mut self, time_ms: f64) {
        if time_ms > self.now_ms {
            self.now_ms = time_ms;
        }
    }

    /// Move the clock forward by `dt_ms`
    pub fn advance(&mut self, dt_ms: f64) {
        self.advance_to(self.now_ms + dt_ms.max(0.0));
    }

    /// Remove and return the earliest timer that is due at the current time
    pub fn pop_due(&mut self) -> Option<(TimerId, T)> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= self.now_ms)
            .min_by(|(_, a), (_, b)| a.due_ms.total_cmp(&b.due_ms).then(a.id.cmp(&b.id)))
            .map(|(i, _)| i)?;
        let timer = self.timers.remove(index);
        Some((timer.id, timer.action))
    }

    /// Advance by `dt_ms` and drain everything that became due, in order
    pub fn drain_due(&mut self, dt_ms: f64) -> Vec<T> {
        self.advance(dt_ms);
        std::iter::from_fn(|| self.pop_due().map(|(_, action)| action)).collect()
    }
}
