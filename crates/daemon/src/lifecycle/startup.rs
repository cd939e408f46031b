// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;

use fs2::FileExt;
use jobd_core::SystemClock;
use tokio::net::UnixListener;
use tracing::info;

use crate::engine::{Manager, ManagerConfig, ProcessSupervisor};
use crate::mux::Multiplexer;

use super::{Config, DaemonState, LifecycleError};

/// Result of daemon startup: the state for the engine loop, the socket
/// listener to spawn as a task, and the event multiplexer.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
    pub mux: Multiplexer,
}

/// Start the daemon.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock -
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create every directory we touch.
    std::fs::create_dir_all(&config.manifest_dir)?;
    std::fs::create_dir_all(&config.property_dir)?;
    std::fs::create_dir_all(&config.status_dir)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire the pidfile lock FIRST - prevents startup races. Open
    // without truncating so a failed lock doesn't wipe the running
    // daemon's pid.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.pidfile_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Build the manager. Volatile status from a previous run describes
    // children that no longer exist; wipe it before the first scan.
    let mut manager = Manager::new(
        ManagerConfig {
            manifest_dir: config.manifest_dir.clone(),
            property_dir: config.property_dir.clone(),
            status_dir: config.status_dir.clone(),
            status_file: config.status_file_path.clone(),
            kill_grace: crate::env::kill_grace(),
        },
        ProcessSupervisor::from_env(),
        SystemClock,
    );
    manager.statuses.clear();

    // 4. Allocate the multiplexer and install signal handlers; failure
    // here is fatal.
    let mut mux = Multiplexer::new();
    mux.watch_signals().map_err(LifecycleError::Signals)?;

    // 5. Remove a stale socket and bind, LAST, so clients only ever see a
    // socket backed by a live daemon.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    // 6. Initial scan: define, load and run everything in the manifest
    // directory. Runs before the engine loop starts, so a racing `load`
    // request cannot double-define a job.
    manager.rescan(&mut mux).map_err(|e| LifecycleError::Scan(e.to_string()))?;

    info!(
        jobs = manager.registry.len(),
        socket = %config.socket_path.display(),
        "daemon started"
    );

    Ok(StartupResult {
        daemon: DaemonState::new(config.clone(), lock_file, manager),
        listener,
        mux,
    })
}

/// Best-effort cleanup when startup fails part-way.
fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.pidfile_path.exists() {
        let _ = std::fs::remove_file(&config.pidfile_path);
    }
}
