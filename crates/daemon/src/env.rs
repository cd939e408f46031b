// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Daemon version string.
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

fn home() -> Result<PathBuf, LifecycleError> {
    std::env::var("HOME").map(PathBuf::from).map_err(|_| LifecycleError::NoHomeDir)
}

/// Manifest directory: JOBD_MANIFEST_DIR > XDG_CONFIG_HOME/jobd/manifests
/// > ~/.config/jobd/manifests
pub fn manifest_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("JOBD_MANIFEST_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("jobd/manifests"));
    }
    Ok(home()?.join(".config/jobd/manifests"))
}

/// Data directory: JOBD_DATA_DIR > XDG_DATA_HOME/jobd > ~/.local/share/jobd
pub fn data_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("JOBD_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return Ok(PathBuf::from(xdg).join("jobd"));
    }
    Ok(home()?.join(".local/share/jobd"))
}

/// Runtime directory: JOBD_RUNTIME_DIR > XDG_RUNTIME_DIR/jobd
/// > XDG_STATE_HOME/jobd/run > ~/.local/state/jobd/run
pub fn runtime_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("JOBD_RUNTIME_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(xdg).join("jobd"));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("jobd/run"));
    }
    Ok(home()?.join(".local/state/jobd/run"))
}

/// Path of the daemon's control socket.
pub fn socket_path() -> Result<PathBuf, LifecycleError> {
    Ok(runtime_dir()?.join("jobd.sock"))
}

/// Default IPC timeout (override: `JOBD_IPC_TIMEOUT_MS`).
pub fn ipc_timeout() -> Duration {
    std::env::var("JOBD_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Grace period between TERM and KILL during unload
/// (override: `JOBD_KILL_GRACE_MS`).
pub fn kill_grace() -> Duration {
    std::env::var("JOBD_KILL_GRACE_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// When set, child processes are not forked; useful for tests.
pub fn debug_nofork() -> bool {
    std::env::var("JOBD_DEBUG_NOFORK").is_ok_and(|v| !v.is_empty() && v != "0")
}
