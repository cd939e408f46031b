// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reschedule policy after a reap.

use jobd_core::test_support::manifest;
use jobd_core::{Clock, ExitStatus, FaultKind, JobState, TimerId};

use crate::engine::test_helpers::*;

#[test]
fn disabled_job_settles_loaded() {
    let mut ctx = setup();
    let (_, pid) = ctx.start(manifest("a").run_at_load(true).keep_alive(true).build());
    ctx.manager.disable("a").unwrap();

    ctx.exit(pid, 0);
    let job = ctx.job("a");
    assert_eq!(job.state, JobState::Loaded);
    assert!(job.restart_after.is_none());
    assert!(job.fault.is_none());
}

#[test]
fn periodic_job_waits_for_the_next_fire() {
    let mut ctx = setup();
    let (label, pid) = ctx.start(manifest("tick").start_interval(2).build());

    ctx.exit(pid, 0);
    assert_eq!(ctx.job("tick").state, JobState::Waiting);

    // Timer fire pushes it back to RUNNING with a fresh pid.
    ctx.manager.on_timer(&TimerId::interval(&label), &mut ctx.mux);
    let job = ctx.job("tick");
    assert!(matches!(job.state, JobState::Running { .. }));
    assert_ne!(job.pid(), pid);
}

#[test]
fn start_interval_wins_over_keep_alive() {
    let mut ctx = setup();
    let (_, pid) =
        ctx.start(manifest("both").start_interval(2).keep_alive(true).build());

    ctx.exit(pid, 0);
    let job = ctx.job("both");
    assert_eq!(job.state, JobState::Waiting);
    assert!(job.restart_after.is_none());
    assert!(!ctx.mux.has_timer(&TimerId::keepalive_wake()));
}

#[test]
fn keep_alive_schedules_a_throttled_restart() {
    let mut ctx = setup();
    let (_, pid) = ctx.start(manifest("ka").keep_alive(true).throttle_interval(2).build());
    let exited_at = ctx.clock.epoch_ms();

    ctx.exit(pid, 1);
    let job = ctx.job("ka");
    assert_eq!(job.state, JobState::Exited);
    assert_eq!(job.last_exit_status, 1);
    assert_eq!(job.restart_after, Some(exited_at + 2000));
    assert!(ctx.mux.has_timer(&TimerId::keepalive_wake()));
}

#[test]
fn no_policy_job_goes_offline() {
    let mut ctx = setup();
    let (_, pid) = ctx.start(manifest("oneshot").run_at_load(true).build());

    ctx.exit(pid, 0);
    let job = ctx.job("oneshot");
    assert_eq!(job.state, JobState::Loaded);
    assert_eq!(job.fault.as_ref().unwrap().kind, FaultKind::Offline);
    assert!(!job.is_runnable());

    // The fault is durable.
    let props = std::fs::read_to_string(ctx.dir.path().join("property/oneshot.json")).unwrap();
    assert!(props.contains("offline"));
}

#[test]
fn signal_exit_records_minus_one_and_the_signal() {
    let mut ctx = setup();
    let (_, pid) = ctx.start(manifest("sig").run_at_load(true).build());

    ctx.manager.reap(pid, ExitStatus::Signaled(9), &mut ctx.mux);
    let job = ctx.job("sig");
    assert_eq!(job.last_exit_status, -1);
    assert_eq!(job.term_signal, 9);
}

#[test]
fn periodic_fire_while_running_is_dropped() {
    let mut ctx = setup();
    let (label, pid) = ctx.start(manifest("slow").start_interval(1).build());

    ctx.manager.on_timer(&TimerId::interval(&label), &mut ctx.mux);
    let job = ctx.job("slow");
    assert_eq!(job.pid(), pid, "no overlapping run");
    assert_eq!(ctx.manager.supervisor.spawned.len(), 1);
}

#[test]
fn timer_fire_for_a_faulted_job_is_skipped() {
    let mut ctx = setup();
    let (label, pid) = ctx.start(manifest("flaky").start_interval(1).build());
    ctx.exit(pid, 0);

    // Fault the job; the timer keeps firing but must not start it.
    {
        let job = ctx.manager.registry.by_label_mut("flaky").unwrap();
        job.state = JobState::Loaded;
        job.fault = Some(jobd_core::Fault::offline());
    }
    ctx.manager.on_timer(&TimerId::interval(&label), &mut ctx.mux);
    assert_eq!(ctx.manager.supervisor.spawned.len(), 1);
}

#[test]
fn disabled_waiting_job_is_not_relaunched_by_its_timer() {
    let mut ctx = setup();
    let (label, pid) = ctx.start(manifest("tick").start_interval(1).build());
    ctx.exit(pid, 0);
    assert_eq!(ctx.job("tick").state, JobState::Waiting);

    ctx.manager.disable("tick").unwrap();
    ctx.manager.on_timer(&TimerId::interval(&label), &mut ctx.mux);
    assert_eq!(ctx.job("tick").state, JobState::Waiting, "disabled job must not relaunch");
    assert_eq!(ctx.manager.supervisor.spawned.len(), 1);
}

#[test]
fn stale_timer_for_a_deleted_job_is_cancelled() {
    let mut ctx = setup();
    let label = ctx.define_load(manifest("gone").start_interval(1).build());
    ctx.manager.unload("gone", &mut ctx.mux).unwrap();

    // A fire that raced the unload is ignored and the timer dropped.
    ctx.manager.on_timer(&TimerId::interval(&label), &mut ctx.mux);
    assert!(!ctx.mux.has_timer(&TimerId::interval(&label)));
}

#[test]
fn unknown_pid_reap_is_harmless() {
    let mut ctx = setup();
    ctx.start(manifest("a").run_at_load(true).build());
    ctx.manager.reap(99999, ExitStatus::Exited(0), &mut ctx.mux);
    assert!(matches!(ctx.job("a").state, JobState::Running { .. }));
}
