// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keep-alive wake-up scheduling.

use std::time::Duration;

use jobd_core::test_support::manifest;
use jobd_core::{JobState, TimerId};

use crate::engine::test_helpers::*;

#[test]
fn wake_restarts_a_due_job() {
    let mut ctx = setup();
    let (_, pid) = ctx.start(manifest("ka").keep_alive(true).throttle_interval(2).build());
    ctx.exit(pid, 1);

    ctx.clock.advance(Duration::from_millis(2100));
    ctx.manager.keepalive_wake(&mut ctx.mux);

    let job = ctx.job("ka");
    assert!(matches!(job.state, JobState::Running { .. }));
    assert_ne!(job.pid(), pid);
    assert!(job.restart_after.is_none());
}

#[test]
fn wake_before_the_throttle_does_nothing() {
    let mut ctx = setup();
    let (_, pid) = ctx.start(manifest("ka").keep_alive(true).throttle_interval(5).build());
    ctx.exit(pid, 1);

    ctx.clock.advance(Duration::from_millis(1000));
    ctx.manager.keepalive_wake(&mut ctx.mux);

    assert_eq!(ctx.job("ka").state, JobState::Exited);
    // The wake timer stays armed for the remaining delay.
    assert!(ctx.mux.has_timer(&TimerId::keepalive_wake()));
}

#[test]
fn restarts_respect_the_throttle_over_time() {
    let mut ctx = setup();
    let (_, first_pid) =
        ctx.start(manifest("crashy").keep_alive(true).throttle_interval(2).build());

    // Crash-restart cycles: each restart happens only after the throttle.
    let mut pid = first_pid;
    let mut restarts = 0;
    for _ in 0..3 {
        ctx.exit(pid, 1);
        assert_eq!(ctx.job("crashy").state, JobState::Exited);

        // A wake half-way through the throttle does nothing.
        ctx.clock.advance(Duration::from_millis(1000));
        ctx.manager.keepalive_wake(&mut ctx.mux);
        assert_eq!(ctx.job("crashy").state, JobState::Exited);

        ctx.clock.advance(Duration::from_millis(1100));
        ctx.manager.keepalive_wake(&mut ctx.mux);
        assert!(matches!(ctx.job("crashy").state, JobState::Running { .. }));
        let new_pid = ctx.job("crashy").pid();
        assert_ne!(new_pid, pid);
        pid = new_pid;
        restarts += 1;
    }
    assert_eq!(restarts, 3);
}

#[test]
fn wake_skips_a_disabled_job() {
    let mut ctx = setup();
    let (_, pid) = ctx.start(manifest("ka").keep_alive(true).throttle_interval(1).build());
    ctx.exit(pid, 1);
    ctx.manager.disable("ka").unwrap();

    ctx.clock.advance(Duration::from_millis(1500));
    ctx.manager.keepalive_wake(&mut ctx.mux);

    let job = ctx.job("ka");
    assert_eq!(job.state, JobState::Loaded);
    assert!(job.restart_after.is_none());
    // No candidates left; the shared timer is disabled.
    assert!(!ctx.mux.has_timer(&TimerId::keepalive_wake()));
}

#[test]
fn rearm_targets_the_earliest_restart() {
    let mut ctx = setup();
    let (_, pid_slow) =
        ctx.start(manifest("slow").keep_alive(true).throttle_interval(30).build());
    let (_, pid_fast) =
        ctx.start(manifest("fast").keep_alive(true).throttle_interval(2).build());

    ctx.exit(pid_slow, 1);
    ctx.exit(pid_fast, 1);

    // After both reaps the wake timer tracks the earlier deadline: the fast
    // job restarts on a wake 2.5s in, the slow one stays down.
    ctx.clock.advance(Duration::from_millis(2500));
    ctx.manager.keepalive_wake(&mut ctx.mux);
    assert!(matches!(ctx.job("fast").state, JobState::Running { .. }));
    assert_eq!(ctx.job("slow").state, JobState::Exited);
    assert!(ctx.mux.has_timer(&TimerId::keepalive_wake()));
}

#[test]
fn rearm_with_a_past_deadline_still_arms() {
    let mut ctx = setup();
    let (_, pid) = ctx.start(manifest("ka").keep_alive(true).throttle_interval(1).build());
    ctx.exit(pid, 1);

    // Simulate the wall clock having moved past the restart time without a
    // wake (e.g. clock adjustments): rearm must not drop the timer.
    ctx.clock.advance(Duration::from_secs(60));
    ctx.manager.keepalive_rearm(&mut ctx.mux);
    assert!(ctx.mux.has_timer(&TimerId::keepalive_wake()));
}
