// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC client for the jobd control socket.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use jobd_daemon::env::ipc_timeout;
use jobd_daemon::protocol::{self, ProtocolError, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

/// Errors from talking to the daemon.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("jobd is not running (no socket at {0})")]
    NotRunning(PathBuf),

    #[error("could not resolve the daemon socket path: {0}")]
    Env(#[from] jobd_daemon::lifecycle::LifecycleError),

    #[error("{code}: {message}")]
    Rpc { code: String, message: String },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Client over the daemon's Unix socket. One request per connection.
pub struct DaemonClient {
    socket_path: PathBuf,
    next_id: AtomicU64,
}

impl DaemonClient {
    pub fn new() -> Result<Self, ClientError> {
        Ok(Self { socket_path: jobd_daemon::env::socket_path()?, next_id: AtomicU64::new(1) })
    }

    /// Send one request and return its result value.
    pub async fn call(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, ClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|_| ClientError::NotRunning(self.socket_path.clone()))?;
        let (mut reader, mut writer) = stream.into_split();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(id, method, params);
        protocol::send(&mut writer, &request, ipc_timeout()).await?;

        let response: Response = protocol::recv(&mut reader, ipc_timeout()).await?;
        match response.error {
            Some(e) => Err(ClientError::Rpc { code: e.code, message: e.message }),
            None => Ok(response.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}
