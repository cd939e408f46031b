// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon communication.
//!
//! Requests are JSON-RPC shaped: `{ id, method, params: [...] }`;
//! responses are `{ id, result }` or `{ id, error: { code, message } }`.
//! Each message travels as one length-prefixed frame, one request per
//! connection; the connection closes after the response.

mod request;
mod response;
mod wire;

pub use request::Request;
pub use response::{Response, RpcError};
pub use wire::{read_frame, recv, send, write_frame, ProtocolError, MAX_FRAME_SIZE};
