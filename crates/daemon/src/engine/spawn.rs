// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child supervisor: process creation and signalling.
//!
//! Invoked synchronously by the state machine. On success the returned pid
//! is already watched by the multiplexer; on failure the error names the
//! step that failed.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use jobd_core::{ExitStatus, Manifest};
use nix::sys::signal::{kill, Signal as NixSignal};
use nix::unistd::Pid;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::mux::Multiplexer;

/// Errors from the spawn path, by failed step.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("resolve user {user}: {reason}")]
    ResolveUser { user: String, reason: String },

    #[error("resolve group {group}: {reason}")]
    ResolveGroup { group: String, reason: String },

    #[error("open {path}: {source}")]
    OpenStdio {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("RootDirectory requires privileges this daemon does not have")]
    RootDirectory,

    #[error("spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Process creation and signalling, behind a trait so the state machine is
/// testable without forking.
pub trait Supervisor {
    /// Launch the manifest's command. The returned pid is guaranteed to be
    /// watched before this returns.
    fn spawn(&mut self, manifest: &Manifest, mux: &mut Multiplexer) -> Result<u32, SpawnError>;

    /// Ask a child to terminate (SIGTERM).
    fn terminate(&self, pid: u32);

    /// Force-kill a child (SIGKILL).
    fn kill(&self, pid: u32);
}

/// The production supervisor.
pub struct ProcessSupervisor {
    /// When set, no processes are created; synthetic pids exit immediately.
    nofork: bool,
}

impl ProcessSupervisor {
    pub fn new(nofork: bool) -> Self {
        Self { nofork }
    }

    pub fn from_env() -> Self {
        Self::new(crate::env::debug_nofork())
    }
}

impl Supervisor for ProcessSupervisor {
    fn spawn(&mut self, manifest: &Manifest, mux: &mut Multiplexer) -> Result<u32, SpawnError> {
        if self.nofork {
            let pid = mux.watch_exit_synthetic(ExitStatus::Exited(0));
            debug!(label = %manifest.label, pid, "no-fork mode, synthetic child");
            return Ok(pid);
        }

        let mut cmd = tokio::process::Command::new(manifest.executable());
        cmd.args(manifest.args());
        cmd.envs(&manifest.environment_variables);

        if manifest.root_directory.is_some() {
            return Err(SpawnError::RootDirectory);
        }
        if let Some(dir) = &manifest.working_directory {
            cmd.current_dir(dir);
        }

        if let Some(user) = &manifest.user_name {
            let entry = nix::unistd::User::from_name(user)
                .map_err(|e| SpawnError::ResolveUser { user: user.clone(), reason: e.to_string() })?
                .ok_or_else(|| SpawnError::ResolveUser {
                    user: user.clone(),
                    reason: "no such user".to_string(),
                })?;
            cmd.uid(entry.uid.as_raw());
            if manifest.group_name.is_none() {
                cmd.gid(entry.gid.as_raw());
            }
        }
        if let Some(group) = &manifest.group_name {
            let entry = nix::unistd::Group::from_name(group)
                .map_err(|e| SpawnError::ResolveGroup {
                    group: group.clone(),
                    reason: e.to_string(),
                })?
                .ok_or_else(|| SpawnError::ResolveGroup {
                    group: group.clone(),
                    reason: "no such group".to_string(),
                })?;
            cmd.gid(entry.gid.as_raw());
        }

        cmd.stdin(match &manifest.standard_in_path {
            Some(path) => read_stdio(path)?,
            None => Stdio::null(),
        });
        cmd.stdout(match &manifest.standard_out_path {
            Some(path) => append_stdio(path)?,
            None => Stdio::null(),
        });
        cmd.stderr(match &manifest.standard_error_path {
            Some(path) => append_stdio(path)?,
            None => Stdio::null(),
        });

        // The child outlives the daemon if the daemon is killed; reaping is
        // the multiplexer's job, not drop glue.
        cmd.kill_on_drop(false);

        let child = cmd.spawn().map_err(|e| SpawnError::Spawn {
            program: manifest.executable().to_string(),
            source: e,
        })?;
        let pid = child.id().ok_or_else(|| SpawnError::Spawn {
            program: manifest.executable().to_string(),
            source: std::io::Error::other("child has no pid"),
        })?;

        mux.watch_exit(pid, child);
        info!(label = %manifest.label, pid, program = manifest.executable(), "child spawned");
        Ok(pid)
    }

    fn terminate(&self, pid: u32) {
        deliver(pid, NixSignal::SIGTERM);
    }

    fn kill(&self, pid: u32) {
        deliver(pid, NixSignal::SIGKILL);
    }
}

fn deliver(pid: u32, signal: NixSignal) {
    // Synthetic no-fork pids sit above i32::MAX; there is no process to
    // signal, and a negative cast would target a process group.
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid), signal) {
        // ESRCH just means the child already exited; the reap is in flight.
        if e != nix::errno::Errno::ESRCH {
            warn!(pid, signal = %signal, error = %e, "failed to signal child");
        }
    }
}

fn read_stdio(path: &Path) -> Result<Stdio, SpawnError> {
    let file = File::open(path)
        .map_err(|e| SpawnError::OpenStdio { path: path.to_path_buf(), source: e })?;
    Ok(Stdio::from(file))
}

fn append_stdio(path: &Path) -> Result<Stdio, SpawnError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SpawnError::OpenStdio { path: path.to_path_buf(), source: e })?;
    Ok(Stdio::from(file))
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
