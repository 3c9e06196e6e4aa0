// src/core/client/worker.rs

//! The reconnecting broker client.
//!
//! Wraps [`Session`] in an unbounded retry loop: clean closes and transient
//! failures (I/O errors, protocol desync) are retried after a fixed backoff,
//! while unclassified errors end the record stream so the daemon can exit
//! instead of masking a bug by retrying blindly.

use crate::core::client::session::Session;
use crate::core::protocol::CommandRecord;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

/// The number of decoded records that may sit between the session's read loop
/// and the consumer before the read loop blocks.
const RECORD_CHANNEL_CAPACITY: usize = 16;

/// Immutable per-client configuration, created once at startup.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub api_key: String,
    pub topic: String,
    /// Delay between keepalive pings while a connection is open.
    pub keepalive_interval: Duration,
    /// Fixed delay before retrying after a closed or failed session.
    pub reconnect_backoff: Duration,
}

/// The only entry point the daemon consumes: a client that presents a single
/// stream of command records across any number of reconnects.
pub struct BrokerClient {
    config: SessionConfig,
}

impl BrokerClient {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Starts the client and returns the stream of inbound command records.
    ///
    /// The stream survives connection failures transparently. It ends only
    /// when the client hits an error it cannot classify as transient;
    /// sessions yield records strictly in wire order, but records in flight
    /// while disconnected are lost.
    pub fn connect(self) -> ReceiverStream<CommandRecord> {
        let (tx, rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);
        tokio::spawn(self.run(tx));
        ReceiverStream::new(rx)
    }

    /// The main run loop: one session per iteration, with a fixed backoff
    /// between attempts. Unbounded for clean closes and transient errors.
    async fn run(self, tx: mpsc::Sender<CommandRecord>) {
        let session = Session::new(self.config.clone());
        loop {
            match session.run(&tx).await {
                Ok(()) => {
                    info!("Connection to broker ended cleanly. Reconnecting...");
                }
                Err(e) if e.is_transient() => {
                    warn!("Session failed: {e}. Reconnecting...");
                }
                Err(e) => {
                    // Dropping `tx` ends the record stream; the daemon exits.
                    error!("Unrecoverable client error: {e}. Giving up.");
                    return;
                }
            }

            if tx.is_closed() {
                debug!("Record consumer is gone, stopping broker client");
                return;
            }

            info!(
                "Will reconnect to {}:{} in {:?}",
                self.config.host, self.config.port, self.config.reconnect_backoff
            );
            tokio::time::sleep(self.config.reconnect_backoff).await;
        }
    }
}
