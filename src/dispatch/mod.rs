// src/dispatch/mod.rs

//! Translates decoded command records into local side effects.
//!
//! The dispatcher only routes: `msg=on` wakes the target machine, `msg=off`
//! suspends it, anything else is ignored. Handler failures are logged and
//! never fed back into the protocol client's control flow.

pub mod suspend;
pub mod wake;

use crate::config::{SuspendConfig, WakeConfig};
use crate::core::{BridgeError, CommandRecord};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The side-effect seam. Production code plugs in [`PowerActions`]; tests
/// plug in recording mocks.
#[async_trait]
pub trait PowerHandler: Send + Sync {
    async fn wake(&self) -> Result<(), BridgeError>;
    async fn suspend(&self) -> Result<(), BridgeError>;
}

/// Routes command records to the configured power handler.
pub struct Dispatcher {
    handler: Arc<dyn PowerHandler>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn PowerHandler>) -> Self {
        Self { handler }
    }

    /// Dispatches one record. Invokes at most one handler action per record.
    pub async fn dispatch(&self, record: &CommandRecord) {
        match record.first("msg") {
            Some("on") => {
                info!("Received power-on command, sending wake packet");
                if let Err(e) = self.handler.wake().await {
                    warn!("Wake handler failed: {e}");
                }
            }
            Some("off") => {
                info!("Received power-off command, suspending target host");
                if let Err(e) = self.handler.suspend().await {
                    warn!("Suspend handler failed: {e}");
                }
            }
            other => {
                debug!(
                    "Ignoring record with cmd={} and msg={other:?}",
                    record.cmd()
                );
            }
        }
    }
}

/// The production handler: Wake-on-LAN for `on`, remote suspend over SSH for
/// `off`.
pub struct PowerActions {
    wake: WakeConfig,
    suspend: SuspendConfig,
}

impl PowerActions {
    pub fn new(wake: WakeConfig, suspend: SuspendConfig) -> Self {
        Self { wake, suspend }
    }
}

#[async_trait]
impl PowerHandler for PowerActions {
    async fn wake(&self) -> Result<(), BridgeError> {
        wake::send_magic_packet(&self.wake.mac, self.wake.broadcast, self.wake.port).await
    }

    async fn suspend(&self) -> Result<(), BridgeError> {
        suspend::suspend_host(&self.suspend.host, &self.suspend.identity_file).await
    }
}
