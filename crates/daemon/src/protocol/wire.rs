// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame codec for the control socket.
//!
//! Every message travels as one frame: a 4-byte big-endian payload length
//! followed by the JSON payload. A connection carries exactly one request
//! frame in and one response frame out, so the codec is a single generic
//! [`recv`]/[`send`] pair used from both ends of the conversation.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Length of the frame header.
const HEADER_LEN: usize = 4;

/// Upper bound on a frame payload (1 MB). Control messages carry at most a
/// manifest path going in or a job listing coming out; anything bigger is a
/// confused or hostile peer.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Failures while exchanging control frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("socket IO failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed control message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    Oversized { size: usize, max: usize },

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("no frame within {0:?}")]
    Deadline(Duration),
}

/// Read one frame's payload. EOF on the header boundary means the peer
/// hung up cleanly; EOF inside a frame is an IO error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncReadExt + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    if let Err(e) = reader.read_exact(&mut header).await {
        return Err(match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ProtocolError::PeerClosed,
            _ => ProtocolError::Io(e),
        });
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::Oversized { size: len, max: MAX_FRAME_SIZE });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write one frame: header, payload, flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWriteExt + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::Oversized { size: payload.len(), max: MAX_FRAME_SIZE });
    }

    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Receive one message, giving up after `deadline`.
///
/// The daemon receives a [`super::Request`]; the client a
/// [`super::Response`].
pub async fn recv<T, R>(reader: &mut R, deadline: Duration) -> Result<T, ProtocolError>
where
    T: DeserializeOwned,
    R: AsyncReadExt + Unpin,
{
    let payload = tokio::time::timeout(deadline, read_frame(reader))
        .await
        .map_err(|_| ProtocolError::Deadline(deadline))??;
    Ok(serde_json::from_slice(&payload)?)
}

/// Send one message, giving up after `deadline`.
pub async fn send<T, W>(writer: &mut W, message: &T, deadline: Duration) -> Result<(), ProtocolError>
where
    T: Serialize,
    W: AsyncWriteExt + Unpin,
{
    let payload = serde_json::to_vec(message)?;
    tokio::time::timeout(deadline, write_frame(writer, &payload))
        .await
        .map_err(|_| ProtocolError::Deadline(deadline))?
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
