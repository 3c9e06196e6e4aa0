// src/config.rs

//! Manages daemon configuration: loading the TOML file and applying defaults.

use crate::core::client::SessionConfig;
use crate::dispatch::wake::MacAddr;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// The full daemon configuration, loaded once at startup and never mutated.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// The bemfa cloud API key used in the subscription handshake.
    pub api_key: String,
    /// The topic this bridge subscribes to.
    pub topic: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub broker: BrokerConfig,
    pub wake: WakeConfig,
    pub suspend: SuspendConfig,
}

/// Connection settings for the broker endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_host")]
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
    /// Delay between keepalive pings while a connection is open.
    #[serde(default = "default_keepalive_interval", with = "humantime_serde")]
    pub keepalive_interval: Duration,
    /// Fixed delay before retrying after a closed or failed connection.
    #[serde(default = "default_reconnect_backoff", with = "humantime_serde")]
    pub reconnect_backoff: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            keepalive_interval: default_keepalive_interval(),
            reconnect_backoff: default_reconnect_backoff(),
        }
    }
}

/// Wake-on-LAN settings for the machine to wake.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WakeConfig {
    /// Hardware address of the network card to wake.
    pub mac: MacAddr,
    /// Broadcast address of the local network.
    pub broadcast: IpAddr,
    #[serde(default = "default_wol_port")]
    pub port: u16,
}

/// SSH settings for the machine to suspend.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SuspendConfig {
    /// SSH destination, `user@host` or a host from ssh_config.
    pub host: String,
    /// Private key used to authenticate.
    pub identity_file: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_broker_host() -> String {
    "bemfa.com".to_string()
}
fn default_broker_port() -> u16 {
    8344
}
fn default_keepalive_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_reconnect_backoff() -> Duration {
    Duration::from_secs(60)
}
fn default_wol_port() -> u16 {
    9
}

impl Config {
    /// Loads and validates the configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(anyhow!("api_key must not be empty"));
        }
        if self.topic.is_empty() {
            return Err(anyhow!("topic must not be empty"));
        }
        Ok(())
    }

    /// The immutable slice of this configuration the protocol client consumes.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            host: self.broker.host.clone(),
            port: self.broker.port,
            api_key: self.api_key.clone(),
            topic: self.topic.clone(),
            keepalive_interval: self.broker.keepalive_interval,
            reconnect_backoff: self.broker.reconnect_backoff,
        }
    }
}
