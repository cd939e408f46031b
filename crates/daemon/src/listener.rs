// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The listener accepts connections and moves bytes; every request is
//! forwarded to the engine loop as a control event and the response is
//! written back on the same connection. One request per connection.

use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::env::ipc_timeout;
use crate::mux::{ControlRequest, MuxEvent};
use crate::protocol::{self, ProtocolError, Request, Response};

/// Errors from connection handling.
#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("engine loop is gone")]
    EngineGone,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    events: mpsc::Sender<MuxEvent>,
}

impl Listener {
    pub fn new(unix: UnixListener, events: mpsc::Sender<MuxEvent>) -> Self {
        Self { unix, events }
    }

    /// Accept connections forever, spawning a task per connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, events).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(ProtocolError::PeerClosed) => {
            debug!("client disconnected")
        }
        _ => error!("connection error: {}", e),
    }
}

/// Handle a single client connection: read one request, run it on the
/// engine loop, write the response.
async fn handle_connection(
    stream: tokio::net::UnixStream,
    events: mpsc::Sender<MuxEvent>,
) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();

    let request: Request = protocol::recv(&mut reader, ipc_timeout()).await?;

    // Queries are frequent polling; log them quieter than mutations.
    if matches!(request.method.as_str(), "status" | "list") {
        debug!(method = %request.method, "received query");
    } else {
        info!(method = %request.method, params = ?request.params, "received request");
    }

    let response = run_on_engine(request, &events).await?;

    protocol::send(&mut writer, &response, ipc_timeout()).await?;
    Ok(())
}

/// Deliver the request to the engine loop and wait for its response.
async fn run_on_engine(
    request: Request,
    events: &mpsc::Sender<MuxEvent>,
) -> Result<Response, ConnectionError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    events
        .send(MuxEvent::Control(ControlRequest { request, reply: reply_tx }))
        .await
        .map_err(|_| ConnectionError::EngineGone)?;
    reply_rx.await.map_err(|_| ConnectionError::EngineGone)
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
