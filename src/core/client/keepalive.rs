// src/core/client/keepalive.rs

//! The keepalive heartbeat, keeping the broker from treating the connection
//! as idle.

use crate::core::BridgeError;
use crate::core::protocol::ClientFrame;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Writes a ping to `writer`, then waits `interval`, repeating until the
/// write fails or `cancel` fires.
///
/// A failed write is returned as an I/O error so the enclosing session tears
/// down; this task never retries or reconnects on its own. The first ping is
/// sent immediately after the handshake.
pub async fn run<W>(
    mut writer: W,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin + Send,
{
    let ping = ClientFrame::Ping.encode_to_vec()?;
    loop {
        writer.write_all(&ping).await?;
        writer.flush().await?;

        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
