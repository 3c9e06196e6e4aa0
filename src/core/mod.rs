// src/core/mod.rs

//! The central module containing the protocol client of bemfa-bridge.

pub mod client;
pub mod errors;
pub mod protocol;

pub use errors::BridgeError;
pub use protocol::CommandRecord;
