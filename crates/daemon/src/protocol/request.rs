// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Request from `jobctl` to the daemon.
///
/// `method` is one of `load`, `unload`, `enable`, `disable`, `clear`,
/// `status`, `list`; `params` carries the method's positional arguments
/// (a manifest path for `load`, a label for the per-job methods, nothing
/// for `list`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<serde_json::Value>,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<serde_json::Value>) -> Self {
        Self { id, method: method.into(), params }
    }

    /// Positional string parameter, or `None` when absent or not a string.
    pub fn param_str(&self, index: usize) -> Option<&str> {
        self.params.get(index).and_then(|v| v.as_str())
    }
}
