// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Define / load / run / unload transitions.

use jobd_core::test_support::manifest;
use jobd_core::{FaultKind, JobState, TimerId};

use crate::engine::test_helpers::*;
use crate::engine::ManagerError;

#[test]
fn define_persists_manifest_and_seeds_enabled() {
    let mut ctx = setup();
    let label = ctx.manager.define(manifest("a").enable(false).build()).unwrap();

    assert!(ctx.dir.path().join("manifests/a.json").exists());
    assert!(ctx.dir.path().join("property/a.json").exists());
    assert!(!ctx.job(label.as_str()).enabled);
    assert_eq!(ctx.job(label.as_str()).state, JobState::Defined);
}

#[test]
fn define_rejects_duplicate_labels() {
    let mut ctx = setup();
    ctx.manager.define(manifest("a").build()).unwrap();
    let err = ctx.manager.define(manifest("a").build()).unwrap_err();
    assert!(matches!(err, ManagerError::DuplicateLabel(_)));
}

#[test]
fn load_arms_the_periodic_timer() {
    let mut ctx = setup();
    let label = ctx.define_load(manifest("tick").start_interval(3).build());
    assert_eq!(ctx.job("tick").state, JobState::Loaded);
    assert!(ctx.mux.has_timer(&TimerId::interval(&label)));
}

#[test]
fn load_twice_is_an_invalid_state() {
    let mut ctx = setup();
    ctx.define_load(manifest("a").build());
    let err = ctx.manager.load("a", &mut ctx.mux).unwrap_err();
    assert!(matches!(err, ManagerError::InvalidState { .. }));
}

#[test]
fn load_detects_a_missing_program() {
    let mut ctx = setup();
    ctx.define_load(manifest("ghost").program("/nonexistent/jobd/test/binary").build());

    let job = ctx.job("ghost");
    assert_eq!(job.state, JobState::Loaded);
    assert_eq!(job.fault.as_ref().unwrap().kind, FaultKind::MissingProgram);
    assert!(!job.is_runnable());

    // The fault is durable.
    let props = std::fs::read_to_string(ctx.dir.path().join("property/ghost.json")).unwrap();
    assert!(props.contains("missing_program"));
}

#[test]
fn relative_program_paths_skip_the_existence_check() {
    let mut ctx = setup();
    ctx.define_load(manifest("rel").program("true").build());
    assert!(ctx.job("rel").fault.is_none());
}

#[test]
fn run_records_pid_and_clears_exit_bookkeeping() {
    let mut ctx = setup();
    let label = ctx.define_load(manifest("a").run_at_load(true).build());
    {
        let job = ctx.manager.registry.by_label_mut("a").unwrap();
        job.last_exit_status = 7;
        job.term_signal = 9;
    }
    ctx.manager.run(label.as_str(), &mut ctx.mux).unwrap();

    let job = ctx.job("a");
    assert!(matches!(job.state, JobState::Running { .. }));
    assert_ne!(job.pid(), 0);
    assert_eq!(job.last_exit_status, 0);
    assert_eq!(job.term_signal, 0);
    assert_eq!(ctx.manager.supervisor.spawned.len(), 1);
}

#[test]
fn spawn_failure_faults_the_job() {
    let mut ctx = setup();
    let label = ctx.define_load(manifest("a").run_at_load(true).build());
    ctx.manager.supervisor.fail_next_spawn = true;

    let err = ctx.manager.run(label.as_str(), &mut ctx.mux).unwrap_err();
    assert!(matches!(err, ManagerError::Exec(_)));

    let job = ctx.job("a");
    assert_eq!(job.state, JobState::Loaded);
    assert_eq!(job.fault.as_ref().unwrap().kind, FaultKind::ExecFailed);
    assert!(!job.is_runnable());
}

#[test]
fn run_from_defined_is_an_invalid_state() {
    let mut ctx = setup();
    ctx.manager.define(manifest("a").build()).unwrap();
    let err = ctx.manager.run("a", &mut ctx.mux).unwrap_err();
    assert!(matches!(err, ManagerError::InvalidState { .. }));
}

#[test]
fn unload_idle_job_removes_every_trace() {
    let mut ctx = setup();
    ctx.define_load(manifest("a").build());
    ctx.manager.unload("a", &mut ctx.mux).unwrap();

    assert!(matches!(ctx.manager.registry.by_label("a"), Err(ManagerError::NotFound(_))));
    assert!(!ctx.dir.path().join("manifests/a.json").exists());
    assert!(!ctx.dir.path().join("property/a.json").exists());
}

#[test]
fn unload_unknown_label_is_not_found() {
    let mut ctx = setup();
    let err = ctx.manager.unload("missing", &mut ctx.mux).unwrap_err();
    assert!(matches!(err, ManagerError::NotFound(_)));
}

#[test]
fn unload_running_job_terms_then_reap_deletes() {
    let mut ctx = setup();
    let (label, pid) = ctx.start(manifest("busy").run_at_load(true).build());

    ctx.manager.unload("busy", &mut ctx.mux).unwrap();
    assert_eq!(ctx.job("busy").state, JobState::Killed { pid });
    assert_eq!(*ctx.manager.supervisor.terminated.borrow(), vec![pid]);
    assert!(ctx.mux.has_timer(&TimerId::kill_grace(&label)));

    // The eventual reap completes cleanup.
    ctx.exit(pid, 0);
    assert!(matches!(ctx.manager.registry.by_label("busy"), Err(ManagerError::NotFound(_))));
    assert!(!ctx.mux.has_timer(&TimerId::kill_grace(&label)));
    assert!(!ctx.dir.path().join("manifests/busy.json").exists());
}

#[test]
fn unload_is_idempotent_while_killing() {
    let mut ctx = setup();
    let (_, pid) = ctx.start(manifest("busy").run_at_load(true).build());

    ctx.manager.unload("busy", &mut ctx.mux).unwrap();
    ctx.manager.unload("busy", &mut ctx.mux).unwrap();
    // TERM was sent exactly once.
    assert_eq!(*ctx.manager.supervisor.terminated.borrow(), vec![pid]);
}

#[test]
fn kill_grace_expiry_sends_kill() {
    let mut ctx = setup();
    let (label, pid) = ctx.start(manifest("stuck").run_at_load(true).build());
    ctx.manager.unload("stuck", &mut ctx.mux).unwrap();

    ctx.manager.on_timer(&TimerId::kill_grace(&label), &mut ctx.mux);
    assert_eq!(*ctx.manager.supervisor.killed.borrow(), vec![pid]);
}

#[test]
fn enabled_state_survives_a_restart() {
    let dirs;
    {
        let mut ctx = setup();
        ctx.define_load(manifest("a").build());
        ctx.manager.disable("a").unwrap();
        dirs = ctx.dir;
    }

    // A new manager over the same directories restores the durable flag
    // even though the manifest says Enable=true.
    let clock = jobd_core::FakeClock::new();
    let config = crate::engine::ManagerConfig {
        manifest_dir: dirs.path().join("manifests"),
        property_dir: dirs.path().join("property"),
        status_dir: dirs.path().join("status"),
        status_file: dirs.path().join("jobd.status"),
        kill_grace: std::time::Duration::from_secs(5),
    };
    let mut manager = crate::engine::Manager::new(config, FakeSupervisor::new(), clock);
    let mut mux = crate::mux::Multiplexer::new();
    manager.rescan(&mut mux).unwrap();

    let job = manager.registry.by_label("a").unwrap();
    assert!(!job.enabled);
}

#[test]
fn enable_starts_a_runnable_job() {
    let mut ctx = setup();
    ctx.manager.define(manifest("a").run_at_load(true).enable(false).build()).unwrap();
    ctx.manager.load("a", &mut ctx.mux).unwrap();
    assert_eq!(ctx.manager.supervisor.spawned.len(), 0);

    ctx.manager.enable("a", &mut ctx.mux).unwrap();
    assert!(matches!(ctx.job("a").state, JobState::Running { .. }));
    assert_eq!(ctx.manager.supervisor.spawned.len(), 1);
}

#[test]
fn clear_fault_does_not_run_immediately() {
    let mut ctx = setup();
    ctx.define_load(manifest("ghost").program("/nonexistent/jobd/test/binary").build());
    assert!(ctx.job("ghost").fault.is_some());

    ctx.manager.clear("ghost").unwrap();
    let job = ctx.job("ghost");
    assert!(job.fault.is_none());
    assert_eq!(job.state, JobState::Loaded);
    assert_eq!(ctx.manager.supervisor.spawned.len(), 0);
}

#[test]
fn status_file_lists_every_job() {
    let mut ctx = setup();
    ctx.start(manifest("running").run_at_load(true).build());
    ctx.define_load(manifest("idle").build());

    ctx.manager.write_status_file().unwrap();
    let table = std::fs::read_to_string(ctx.dir.path().join("jobd.status")).unwrap();
    assert!(table.contains("Label"));
    assert!(table.contains("running"));
    assert!(table.contains("idle"));
}
