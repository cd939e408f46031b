// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized manifest storage: one `<label>.json` per defined job.

use std::fs;
use std::path::{Path, PathBuf};

use jobd_core::{Label, Manifest};
use tracing::{debug, warn};

use crate::atomic::write_atomic;
use crate::StoreError;

/// Store of normalized manifests under the manifest directory.
pub struct ManifestStore {
    dir: PathBuf,
}

/// Result of a directory scan.
///
/// Parse failures never abort a scan: one bad file must not prevent other
/// jobs from loading.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub manifests: Vec<Manifest>,
    pub skipped: usize,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, label: &Label) -> PathBuf {
        self.dir.join(format!("{label}.json"))
    }

    /// Persist the normalized form of a manifest (write-then-rename).
    pub fn save(&self, manifest: &Manifest) -> Result<(), StoreError> {
        let path = self.path_for(&manifest.label);
        let body = manifest.normalize().to_string();
        write_atomic(&path, body.as_bytes())
    }

    /// Unlink a manifest at registry-delete. Missing files are fine.
    pub fn remove(&self, label: &Label) -> Result<(), StoreError> {
        let path = self.path_for(label);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Parse every `*.json` in the manifest directory, in file-name order.
    ///
    /// Files that fail to parse or validate are logged and skipped.
    pub fn scan(&self) -> Result<ScanReport, StoreError> {
        debug!(dir = %self.dir.display(), "scanning manifest directory");
        let mut report = ScanReport::default();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(StoreError::io(&self.dir, e)),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable manifest");
                    report.skipped += 1;
                    continue;
                }
            };
            match Manifest::parse(&text) {
                Ok(manifest) => report.manifests.push(manifest),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping malformed manifest");
                    report.skipped += 1;
                }
            }
        }

        debug!(
            total = report.manifests.len(),
            skipped = report.skipped,
            "finished scanning manifests"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
