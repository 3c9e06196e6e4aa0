// src/lib.rs

pub mod config;
pub mod core;
pub mod dispatch;

// Re-export
pub use crate::core::BridgeError;
