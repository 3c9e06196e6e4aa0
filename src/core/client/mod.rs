// src/core/client/mod.rs

//! The resilient broker client: one [`session::Session`] per TCP connection,
//! a [`keepalive`] heartbeat scoped to that session, and the
//! [`worker::BrokerClient`] reconnect loop wrapping both.

pub mod keepalive;
pub mod session;
pub mod worker;

pub use worker::{BrokerClient, SessionConfig};
