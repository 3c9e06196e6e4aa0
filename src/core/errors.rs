// src/core/errors.rs

//! Defines the primary error type for the bridge client.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all failures the protocol client can hit.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Protocol Error: {0}")]
    Protocol(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMacAddress(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Whether the reconnect loop should retry after this error.
    ///
    /// I/O failures are always retried. Protocol errors are retried too: a
    /// malformed line means the stream is desynced, so the session is torn
    /// down and rebuilt like any dropped connection. Everything else is
    /// fatal to the whole client.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Io(_) | BridgeError::Protocol(_))
    }
}

// `std::io::Error` is not cloneable, so it is wrapped in an Arc for cheap,
// shared cloning.
impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Io(Arc::new(e))
    }
}
