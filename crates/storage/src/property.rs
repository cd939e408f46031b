// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-job properties: the pieces of user intent that must survive
//! daemon restarts.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use jobd_core::{Fault, Label};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::atomic::write_atomic;
use crate::StoreError;

/// Durable properties persisted per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProperties {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<Fault>,
}

/// Store of durable properties under `<dataDir>/property`.
pub struct PropertyStore {
    dir: PathBuf,
}

impl PropertyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, label: &Label) -> PathBuf {
        self.dir.join(format!("{label}.json"))
    }

    fn lock_path_for(&self, label: &Label) -> PathBuf {
        self.dir.join(format!("{label}.lock"))
    }

    /// Read a job's properties; `None` when never written.
    pub fn load(&self, label: &Label) -> Result<Option<JobProperties>, StoreError> {
        let path = self.path_for(label);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        match serde_json::from_str(&text) {
            Ok(props) => Ok(Some(props)),
            Err(e) => {
                // A corrupt property file loses the stored intent for this
                // job but must not wedge it.
                warn!(path = %path.display(), error = %e, "discarding corrupt property file");
                Ok(None)
            }
        }
    }

    /// Read-modify-write a job's properties under a per-label advisory lock.
    ///
    /// `edit` receives the current properties (or `seed` when none exist)
    /// and mutates them; the result is fsynced before the rename.
    pub fn edit(
        &self,
        label: &Label,
        seed: JobProperties,
        edit: impl FnOnce(&mut JobProperties),
    ) -> Result<JobProperties, StoreError> {
        let lock_path = self.lock_path_for(label);
        let lock = File::create(&lock_path).map_err(|e| StoreError::io(&lock_path, e))?;
        lock.lock_exclusive().map_err(|e| StoreError::io(&lock_path, e))?;

        let result = (|| {
            let mut props = self.load(label)?.unwrap_or(seed);
            edit(&mut props);
            let path = self.path_for(label);
            let body = serde_json::to_vec(&props).map_err(|e| StoreError::json(&path, e))?;
            write_atomic(&path, &body)?;
            Ok(props)
        })();

        let _ = lock.unlock();
        result
    }

    /// Delete a job's properties (and its lock file) at registry-delete.
    pub fn remove(&self, label: &Label) -> Result<(), StoreError> {
        for path in [self.path_for(label), self.lock_path_for(label)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "property_tests.rs"]
mod tests;
