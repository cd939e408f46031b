// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer bookkeeping for the multiplexer.
//!
//! Millisecond granularity; periodic timers use interval semantics (each
//! fire re-arms relative to the fire, not to an absolute deadline grid).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jobd_core::TimerId;

#[derive(Debug, Clone, Copy)]
struct Timer {
    fires_at: Instant,
    period: Option<Duration>,
}

/// Deadline map for one-shot and periodic timers.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: HashMap<TimerId, Timer>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) a timer. Setting an existing id replaces it.
    pub fn set(&mut self, id: TimerId, delay: Duration, period: Option<Duration>, now: Instant) {
        self.timers.insert(id, Timer { fires_at: now + delay, period });
    }

    /// Cancel a timer; silently succeeds when absent.
    pub fn cancel(&mut self, id: &TimerId) {
        self.timers.remove(id);
    }

    /// Take the earliest due timer, if any. Periodic timers are re-armed
    /// relative to `now`.
    pub fn pop_fired(&mut self, now: Instant) -> Option<TimerId> {
        let id = self
            .timers
            .iter()
            .filter(|(_, t)| t.fires_at <= now)
            .min_by_key(|(_, t)| t.fires_at)
            .map(|(id, _)| id.clone())?;

        match self.timers.get_mut(&id) {
            Some(timer) => match timer.period {
                Some(period) => timer.fires_at = now + period,
                None => {
                    self.timers.remove(&id);
                }
            },
            None => return None,
        }
        Some(id)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|t| t.fires_at).min()
    }

    pub fn contains(&self, id: &TimerId) -> bool {
        self.timers.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
