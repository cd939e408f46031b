// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervision scenarios: launch policies, throttling, faults.

use std::time::Duration;

use serial_test::serial;

use crate::prelude::*;

#[test]
#[serial]
fn run_at_load_launches_once_and_records_the_exit() {
    let daemon = Daemon::start();
    let path = daemon.write_manifest(
        "a.json",
        json!({"Label": "a", "Program": "/bin/true", "RunAtLoad": true}),
    );
    daemon.jobctl_ok(&["load", path.to_str().unwrap()]);

    let settled = daemon.wait_until(Duration::from_secs(5), |d| {
        d.status("a").is_some_and(|s| {
            s.get("last_exit_status").map(String::as_str) == Some("0")
                && matches!(s.get("state").map(String::as_str), Some("loaded" | "exited"))
        })
    });
    assert!(settled, "job never settled: {:?}", daemon.status("a"));
}

#[test]
#[serial]
fn keep_alive_restarts_are_throttled() {
    let daemon = Daemon::start();
    let counter = daemon.root().join("launches");
    let path = daemon.write_manifest(
        "b.json",
        json!({
            "Label": "b",
            "ProgramArguments": ["/bin/sh", "-c", format!("echo x >> {}; exit 1", counter.display())],
            "RunAtLoad": true,
            "KeepAlive": true,
            "ThrottleInterval": 2
        }),
    );
    daemon.jobctl_ok(&["load", path.to_str().unwrap()]);

    std::thread::sleep(Duration::from_secs(10));
    let launches = count_lines(&counter);
    assert!(launches >= 2, "keep-alive never restarted (launches: {launches})");
    assert!(launches <= 6, "throttle violated (launches: {launches})");
}

#[test]
#[serial]
fn periodic_jobs_fire_on_the_interval() {
    let daemon = Daemon::start();
    let counter = daemon.root().join("ticks");
    let path = daemon.write_manifest(
        "c.json",
        json!({
            "Label": "c",
            "ProgramArguments": ["/bin/sh", "-c", format!("echo x >> {}", counter.display())],
            "StartInterval": 1
        }),
    );
    daemon.jobctl_ok(&["load", path.to_str().unwrap()]);

    std::thread::sleep(Duration::from_secs(5));
    daemon.jobctl_ok(&["unload", "c"]);
    let launches = count_lines(&counter);
    assert!((4..=6).contains(&launches), "periodic launches out of range: {launches}");
}

#[test]
#[serial]
fn disable_stops_keep_alive_restarts() {
    let daemon = Daemon::start();
    let counter = daemon.root().join("launches");
    let path = daemon.write_manifest(
        "b.json",
        json!({
            "Label": "b",
            "ProgramArguments": ["/bin/sh", "-c", format!("echo x >> {}; exit 1", counter.display())],
            "RunAtLoad": true,
            "KeepAlive": true,
            "ThrottleInterval": 1
        }),
    );
    daemon.jobctl_ok(&["load", path.to_str().unwrap()]);

    std::thread::sleep(Duration::from_millis(2500));
    daemon.jobctl_ok(&["b", "disable"]);

    // Let any in-flight restart settle, then the count must hold steady.
    std::thread::sleep(Duration::from_millis(1500));
    let after_disable = count_lines(&counter);
    assert!(after_disable >= 1, "job never launched");

    std::thread::sleep(Duration::from_millis(2500));
    assert_eq!(count_lines(&counter), after_disable, "job relaunched while disabled");

    let status = daemon.status("b").expect("status");
    assert_eq!(status.get("enabled").map(String::as_str), Some("false"));
}

#[test]
#[serial]
fn missing_program_faults_until_cleared() {
    let daemon = Daemon::start();
    let path = daemon.write_manifest(
        "ghost.json",
        json!({"Label": "ghost", "Program": "/nonexistent/jobd/spec/binary"}),
    );
    daemon.jobctl_ok(&["load", path.to_str().unwrap()]);

    let status = daemon.status("ghost").expect("status");
    assert!(
        status.get("fault").is_some_and(|f| f.starts_with("missing_program")),
        "expected a missing_program fault, got {status:?}"
    );

    daemon.jobctl_ok(&["ghost", "clear"]);
    let status = daemon.status("ghost").expect("status");
    assert_eq!(status.get("fault").map(String::as_str), Some("none"));
    assert_eq!(status.get("state").map(String::as_str), Some("loaded"));
}

#[test]
#[serial]
fn one_shot_job_without_policy_goes_offline() {
    let daemon = Daemon::start();
    let path = daemon.write_manifest(
        "once.json",
        json!({"Label": "once", "Program": "/bin/true", "RunAtLoad": true}),
    );
    daemon.jobctl_ok(&["load", path.to_str().unwrap()]);

    let offline = daemon.wait_until(Duration::from_secs(5), |d| {
        d.status("once").is_some_and(|s| {
            s.get("fault").is_some_and(|f| f.starts_with("offline"))
        })
    });
    assert!(offline, "expected an offline fault: {:?}", daemon.status("once"));
}
