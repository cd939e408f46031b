// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control plane: turns RPC requests into state-machine operations.
//!
//! Handlers run entirely on the engine-loop task; the listener only moves
//! bytes.

use jobd_core::Clock;
use serde_json::{json, Value};
use tracing::debug;

use crate::mux::Multiplexer;
use crate::protocol::{Request, Response};

use super::manager::Manager;
use super::spawn::Supervisor;
use super::ManagerError;

impl<S, C> Manager<S, C>
where
    S: Supervisor,
    C: Clock,
{
    /// Handle one request and format the response. Errors are reported to
    /// the client verbatim (code + message) and change no further state.
    pub fn handle_request(&mut self, request: &Request, mux: &mut Multiplexer) -> Response {
        match self.dispatch_request(request, mux) {
            Ok(result) => Response::ok(request.id, result),
            Err(e) => {
                debug!(method = %request.method, error = %e, "request failed");
                Response::error(request.id, e.code(), e.to_string())
            }
        }
    }

    fn dispatch_request(
        &mut self,
        request: &Request,
        mux: &mut Multiplexer,
    ) -> Result<Value, ManagerError> {
        match request.method.as_str() {
            "load" => self.rpc_load(param(request, 0)?, mux),
            "unload" => {
                self.unload(param(request, 0)?, mux)?;
                Ok(json!("ok"))
            }
            "enable" => {
                self.enable(param(request, 0)?, mux)?;
                Ok(json!("ok"))
            }
            "disable" => {
                self.disable(param(request, 0)?)?;
                Ok(json!("ok"))
            }
            "clear" => {
                self.clear(param(request, 0)?)?;
                Ok(json!("ok"))
            }
            "status" => self.job_status(param(request, 0)?),
            "list" => Ok(self.list()),
            other => Err(ManagerError::InvalidRequest(format!("unknown method: {other}"))),
        }
    }

    /// `load <manifest-path>`: parse, define, load, run if runnable.
    fn rpc_load(&mut self, path: &str, mux: &mut Multiplexer) -> Result<Value, ManagerError> {
        let text = std::fs::read_to_string(path)?;
        let manifest = jobd_core::Manifest::parse(&text)?;
        let label = self.define(manifest)?;
        self.load(label.as_str(), mux)?;

        let runnable = self.registry.by_label(label.as_str())?.is_runnable();
        if runnable {
            // A failed first run is a job fault, not a load error.
            if let Err(e) = self.run(label.as_str(), mux) {
                tracing::warn!(label = %label, error = %e, "job loaded but failed to start");
            }
        }
        Ok(json!(label.as_str()))
    }

    /// `status <label>`: one job's externally visible state.
    fn job_status(&self, label: &str) -> Result<Value, ManagerError> {
        let job = self.registry.by_label(label)?;
        Ok(json!({
            "pid": job.pid(),
            "state": job.state.to_string(),
            "enabled": job.enabled,
            "fault": job.fault.as_ref().map(|f| json!({
                "kind": f.kind.to_string(),
                "reason": f.reason,
            })),
            "last_exit_status": job.last_exit_status,
            "term_signal": job.term_signal,
        }))
    }

    /// `list`: every job, keyed by label.
    fn list(&self) -> Value {
        let mut map = serde_json::Map::new();
        for job in self.registry.iter() {
            map.insert(
                job.label.to_string(),
                json!({
                    "Pid": job.pid(),
                    "State": job.state.to_string(),
                    "Enabled": job.enabled,
                    "FaultState": job.fault.as_ref().map(|f| f.kind.to_string()),
                }),
            );
        }
        Value::Object(map)
    }
}

fn param<'r>(request: &'r Request, index: usize) -> Result<&'r str, ManagerError> {
    request.param_str(index).ok_or_else(|| {
        ManagerError::InvalidRequest(format!(
            "method {} requires a string parameter",
            request.method
        ))
    })
}
