// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Volatile per-job runtime status.
//!
//! Best-effort by design: a failed write degrades external observability,
//! never the state machine. The whole directory is wiped at daemon startup
//! because any recorded children are gone.

use std::fs;
use std::path::{Path, PathBuf};

use jobd_core::Label;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Runtime status persisted per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuntimeStatus {
    pub pid: u32,
    pub last_exit_status: i32,
    pub term_signal: i32,
}

/// Store of volatile status files under `<runtimeDir>/status`.
pub struct StatusStore {
    dir: PathBuf,
}

impl StatusStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, label: &Label) -> PathBuf {
        self.dir.join(format!("{label}.json"))
    }

    /// Write a job's status. Failures are logged, not returned.
    pub fn write(&self, label: &Label, status: &RuntimeStatus) {
        let path = self.path_for(label);
        let body = match serde_json::to_vec(status) {
            Ok(body) => body,
            Err(e) => {
                warn!(label = %label, error = %e, "failed to encode runtime status");
                return;
            }
        };
        if let Err(e) = fs::write(&path, body) {
            warn!(path = %path.display(), error = %e, "failed to write runtime status");
        }
    }

    pub fn read(&self, label: &Label) -> Option<RuntimeStatus> {
        let text = fs::read_to_string(self.path_for(label)).ok()?;
        serde_json::from_str(&text).ok()
    }

    /// Remove one job's status file.
    pub fn remove(&self, label: &Label) {
        let _ = fs::remove_file(self.path_for(label));
    }

    /// Wipe all status files. Called once at startup.
    pub fn clear(&self) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let _ = fs::remove_file(path);
            }
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
