// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jobd-storage: on-disk persistence for the jobd daemon.
//!
//! Three directories, one file per job in each:
//! - manifest dir: the normalized manifest, written atomically at define
//! - property dir: durable `{ enabled, fault }`, edited under a file lock
//! - status dir: volatile `{ pid, last_exit_status, term_signal }`,
//!   best-effort and wiped on daemon restart

mod atomic;
mod manifest;
mod property;
mod status;

pub use atomic::write_atomic;
pub use manifest::{ManifestStore, ScanReport};
pub use property::{JobProperties, PropertyStore};
pub use status::{RuntimeStatus, StatusStore};

use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    fn json(path: impl Into<std::path::PathBuf>, source: serde_json::Error) -> Self {
        Self::Json { path: path.into(), source }
    }
}
