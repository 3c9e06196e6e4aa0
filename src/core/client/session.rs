// src/core/client/session.rs

//! One TCP connection's full lifecycle: connect, handshake, keepalive
//! supervision, framed read loop, teardown.

use crate::core::BridgeError;
use crate::core::client::keepalive;
use crate::core::client::worker::SessionConfig;
use crate::core::protocol::{ClientFrame, CommandRecord, LineCodec};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A single connection session. Owns the socket exclusively from open to
/// close; nothing outlives a completed session.
pub struct Session {
    config: SessionConfig,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Runs one connection lifecycle, forwarding decoded records into `tx`
    /// in wire order.
    ///
    /// Returns `Ok(())` when the broker closes the connection cleanly (or the
    /// record consumer goes away), and an error for connection or protocol
    /// failures. On every exit path the keepalive task is cancelled and
    /// awaited before this function returns, so no heartbeat can straddle
    /// two sessions.
    pub async fn run(&self, tx: &mpsc::Sender<CommandRecord>) -> Result<(), BridgeError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        debug!("Connecting to broker at {addr}");
        let stream = TcpStream::connect(&addr).await?;
        let (reader, mut writer) = stream.into_split();

        let handshake = ClientFrame::Handshake {
            uid: self.config.api_key.clone(),
            topic: self.config.topic.clone(),
        }
        .encode_to_vec()?;
        writer.write_all(&handshake).await?;
        info!(
            "Connected to broker at {addr}, subscribed to topic '{}'",
            self.config.topic
        );

        // The token's drop guard cancels the keepalive even if this future is
        // dropped mid-await by the consumer.
        let cancel = CancellationToken::new();
        let _cancel_guard = cancel.clone().drop_guard();
        let mut keepalive_task = tokio::spawn(keepalive::run(
            writer,
            self.config.keepalive_interval,
            cancel.clone(),
        ));

        let mut framed = FramedRead::new(reader, LineCodec);
        let end = loop {
            tokio::select! {
                join = &mut keepalive_task => {
                    // The keepalive only finishes early when a ping write
                    // failed; the task is already joined here.
                    return Err(keepalive_failure(join));
                }
                frame = framed.next() => match frame {
                    None => {
                        debug!("Broker closed the connection");
                        break Ok(());
                    }
                    Some(Err(e)) => break Err(e),
                    Some(Ok(record)) => {
                        debug!("Message incoming: {record:?}");
                        if record.is_ping_ack() {
                            continue;
                        }
                        if tx.send(record).await.is_err() {
                            debug!("Record consumer went away, closing session");
                            break Ok(());
                        }
                    }
                }
            }
        };

        cancel.cancel();
        let _ = keepalive_task.await;
        end
    }
}

fn keepalive_failure(join: Result<Result<(), BridgeError>, JoinError>) -> BridgeError {
    match join {
        Ok(Err(e)) => e,
        Ok(Ok(())) => BridgeError::Internal("keepalive task stopped without being cancelled".into()),
        Err(e) => BridgeError::Internal(format!("keepalive task panicked: {e}")),
    }
}
