// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job manager: registry, state machine and scheduling policies.
//!
//! Everything in this module runs on the engine-loop task; there is no
//! shared mutable state and no locking around jobs.

mod control;
mod keepalive;
mod manager;
mod registry;
mod spawn;

pub use manager::{LoopAction, Manager, ManagerConfig};
pub use registry::Registry;
pub use spawn::{ProcessSupervisor, SpawnError, Supervisor};

use jobd_core::{Label, LabelError, ManifestError};
use jobd_storage::StoreError;
use thiserror::Error;

/// Errors surfaced by the job manager.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("job not found: {0}")]
    NotFound(Label),

    #[error("duplicate label: {0}")]
    DuplicateLabel(Label),

    #[error(transparent)]
    Parse(#[from] ManifestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job {label} is {state}; cannot {operation}")]
    InvalidState { label: Label, state: &'static str, operation: &'static str },

    #[error("spawn failed: {0}")]
    Exec(#[from] SpawnError),

    #[error("bad request: {0}")]
    InvalidRequest(String),
}

impl ManagerError {
    /// Stable wire code for RPC error responses.
    pub fn code(&self) -> &'static str {
        match self {
            ManagerError::NotFound(_) => "NOT_FOUND",
            ManagerError::DuplicateLabel(_) => "DUPLICATE_LABEL",
            ManagerError::Parse(_) => "PARSE_ERROR",
            ManagerError::Store(_) | ManagerError::Io(_) => "IO",
            ManagerError::InvalidState { .. } => "INVALID_STATE",
            ManagerError::Exec(_) => "EXEC_FAILED",
            ManagerError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}

impl From<LabelError> for ManagerError {
    fn from(e: LabelError) -> Self {
        ManagerError::Parse(ManifestError::Label(e))
    }
}


#[cfg(test)]
#[path = "manager_tests/mod.rs"]
mod manager_tests;
