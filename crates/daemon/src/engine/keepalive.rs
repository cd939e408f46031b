// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keep-alive bookkeeping: one shared wake-up timer for every throttled
//! restart.

use std::time::Duration;

use jobd_core::{Clock, JobState, TimerId};
use tracing::{debug, warn};

use crate::mux::Multiplexer;

use super::manager::Manager;
use super::spawn::Supervisor;

/// Re-arm floor in milliseconds. Keeps a due wake from spinning while still
/// honoring throttle intervals far below the manifest default.
const WAKE_FLOOR_MS: u64 = 10;

impl<S, C> Manager<S, C>
where
    S: Supervisor,
    C: Clock,
{
    /// Run every throttled job whose restart time has arrived, then re-arm
    /// the shared timer.
    pub(crate) fn keepalive_wake(&mut self, mux: &mut Multiplexer) {
        let now = self.clock.epoch_ms();
        let due: Vec<_> = self
            .registry
            .iter()
            .filter(|job| {
                job.state == JobState::Exited && job.restart_after.is_some_and(|t| t <= now)
            })
            .map(|job| job.label.clone())
            .collect();

        for label in due {
            let eligible = {
                let Ok(job) = self.registry.by_label_mut(label.as_str()) else {
                    continue;
                };
                if !job.enabled || job.fault.is_some() {
                    // The restart lapses; the job settles back to LOADED.
                    job.state = JobState::Loaded;
                    job.restart_after = None;
                    false
                } else {
                    true
                }
            };
            if eligible {
                debug!(label = %label, "keep-alive restart");
                if let Err(e) = self.run(label.as_str(), mux) {
                    warn!(label = %label, error = %e, "keep-alive restart failed");
                }
            }
        }

        self.keepalive_rearm(mux);
    }

    /// Point the shared wake-up timer at the earliest pending restart, or
    /// disable it when there is none. Called after every reap and every
    /// wake.
    pub(crate) fn keepalive_rearm(&mut self, mux: &mut Multiplexer) {
        let next = self
            .registry
            .iter()
            .filter(|job| job.state == JobState::Exited)
            .filter_map(|job| job.restart_after)
            .min();

        let Some(t) = next else {
            mux.cancel_timer(&TimerId::keepalive_wake());
            return;
        };

        let now = self.clock.epoch_ms();
        let delay_ms = if t >= now {
            (t - now).max(WAKE_FLOOR_MS)
        } else {
            warn!(
                restart_after = t,
                now, "keep-alive restart time is in the past; did the wall clock go backwards?"
            );
            WAKE_FLOOR_MS
        };
        mux.set_timer(TimerId::keepalive_wake(), Duration::from_millis(delay_ms));
    }
}
