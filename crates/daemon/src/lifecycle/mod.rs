// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

mod startup;
pub use startup::{startup, StartupResult};

use std::fs::File;
use std::path::PathBuf;

use jobd_core::SystemClock;
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::{Manager, ProcessSupervisor};

/// Daemon runtime with concrete adapter types.
pub type DaemonManager = Manager<ProcessSupervisor, SystemClock>;

/// Daemon configuration: every path the daemon touches, resolved once at
/// startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of normalized job manifests.
    pub manifest_dir: PathBuf,
    /// Directory of durable per-job properties.
    pub property_dir: PathBuf,
    /// Directory of volatile per-job status files.
    pub status_dir: PathBuf,
    /// Path to the control socket.
    pub socket_path: PathBuf,
    /// Path to the pidfile (also the startup lock).
    pub pidfile_path: PathBuf,
    /// Path to the daemon log file.
    pub log_path: PathBuf,
    /// Path of the SIGUSR1 status table.
    pub status_file_path: PathBuf,
}

impl Config {
    /// Resolve all paths from the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        let data_dir = crate::env::data_dir()?;
        let runtime_dir = crate::env::runtime_dir()?;
        Ok(Self {
            manifest_dir: crate::env::manifest_dir()?,
            property_dir: data_dir.join("property"),
            status_dir: runtime_dir.join("status"),
            socket_path: runtime_dir.join("jobd.sock"),
            pidfile_path: runtime_dir.join("jobd.pid"),
            log_path: data_dir.join("jobd.log"),
            status_file_path: runtime_dir.join("jobd.status"),
        })
    }
}

/// Live daemon state. The pidfile lock is held for the daemon's lifetime.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): held to maintain the exclusive pidfile lock;
    // released on drop.
    #[allow(dead_code)]
    lock_file: File,
    pub manager: DaemonManager,
}

impl DaemonState {
    pub(crate) fn new(config: Config, lock_file: File, manager: DaemonManager) -> Self {
        Self { config, lock_file, manager }
    }

    /// Graceful shutdown: remove the socket and pidfile. Children are left
    /// to the INT/TERM semantics the caller already applied.
    pub fn shutdown(&mut self) {
        info!("shutting down daemon");
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("failed to remove socket file: {}", e);
            }
        }
        if self.config.pidfile_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.pidfile_path) {
                warn!("failed to remove pidfile: {}", e);
            }
        }
        info!("daemon shutdown complete");
    }
}

/// Lifecycle errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("failed to acquire pidfile lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("failed to install signal handlers: {0}")]
    Signals(std::io::Error),

    #[error("initial manifest scan failed: {0}")]
    Scan(String),

    #[error(transparent)]
    Store(#[from] jobd_storage::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
