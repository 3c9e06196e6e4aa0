// src/core/protocol/mod.rs

//! The line-oriented wire protocol spoken by the bemfa cloud broker.

pub mod line_frame;

pub use line_frame::{ClientFrame, CommandRecord, LineCodec};
