// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory job record and its state machine vocabulary.

use serde::{Deserialize, Serialize};

use crate::label::Label;
use crate::manifest::Manifest;

/// Lifecycle state of a job.
///
/// `Running` and `Killed` carry the child pid, so a running job without a
/// child process is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Created, not yet loaded. Terminal with respect to registry deletion.
    Defined,
    /// Loaded; timers registered; may be runnable.
    Loaded,
    /// Waiting for its periodic or calendar timer to fire.
    Waiting,
    /// A live child process exists.
    Running { pid: u32 },
    /// Unloaded while running; waiting for the final reap.
    Killed { pid: u32 },
    /// Child exited; keep-alive bookkeeping may restart it.
    Exited,
}

crate::simple_display! {
    JobState {
        Defined => "defined",
        Loaded => "loaded",
        Waiting => "waiting",
        Running { .. } => "running",
        Killed { .. } => "killed",
        Exited => "exited",
    }
}

/// Which scheduling policy governs a loaded job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleKind {
    None,
    Periodic,
    Calendar,
    KeepAlive,
}

crate::simple_display! {
    ScheduleKind {
        None => "none",
        Periodic => "periodic",
        Calendar => "calendar",
        KeepAlive => "keepalive",
    }
}

/// Category of a sticky fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The process exited on its own with no respawn policy.
    Offline,
    /// The program file does not exist.
    MissingProgram,
    /// fork/exec (or equivalent) failed.
    ExecFailed,
}

crate::simple_display! {
    FaultKind {
        Offline => "offline",
        MissingProgram => "missing_program",
        ExecFailed => "exec_failed",
    }
}

/// A sticky condition preventing auto-launch until explicitly cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub reason: String,
}

impl Fault {
    pub fn offline() -> Self {
        Self { kind: FaultKind::Offline, reason: "the process exited unexpectedly".to_string() }
    }

    pub fn missing_program(path: &str) -> Self {
        Self { kind: FaultKind::MissingProgram, reason: format!("no such program: {path}") }
    }

    pub fn exec_failed(detail: impl Into<String>) -> Self {
        Self { kind: FaultKind::ExecFailed, reason: detail.into() }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

/// The in-memory unit combining a manifest and its runtime state.
///
/// Owned exclusively by the registry; mutated only on the engine-loop task.
#[derive(Debug, Clone)]
pub struct Job {
    pub label: Label,
    pub manifest: Manifest,
    pub state: JobState,
    /// Exit code of the last run; -1 when terminated by a signal.
    pub last_exit_status: i32,
    /// Terminating signal of the last run; 0 if none.
    pub term_signal: i32,
    /// Earliest keep-alive restart time (epoch ms); `None` when no restart
    /// is pending.
    pub restart_after: Option<u64>,
    pub schedule: ScheduleKind,
    /// Durable desired state; seeded from the manifest's `Enable` at first
    /// define and changed only by enable/disable requests afterwards.
    pub enabled: bool,
    pub fault: Option<Fault>,
}

impl Job {
    pub fn new(manifest: Manifest, enabled: bool) -> Self {
        let schedule = manifest.schedule_kind();
        Self {
            label: manifest.label.clone(),
            manifest,
            state: JobState::Defined,
            last_exit_status: 0,
            term_signal: 0,
            restart_after: None,
            schedule,
            enabled,
            fault: None,
        }
    }

    /// Child pid, 0 when no child exists.
    pub fn pid(&self) -> u32 {
        match self.state {
            JobState::Running { pid } | JobState::Killed { pid } => pid,
            _ => 0,
        }
    }

    /// Whether the job is eligible to be started right now.
    pub fn is_runnable(&self) -> bool {
        self.state == JobState::Loaded
            && self.enabled
            && self.fault.is_none()
            && (self.manifest.run_at_load || self.schedule != ScheduleKind::None)
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
