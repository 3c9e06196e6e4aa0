// src/dispatch/wake.rs

//! Wake-on-LAN: builds the magic packet for a hardware address and fires it
//! at the network's broadcast address over UDP.

use crate::core::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use tokio::net::UdpSocket;
use tracing::debug;

/// The magic packet is six `0xff` bytes followed by the target MAC sixteen
/// times.
const MAGIC_PACKET_LEN: usize = 6 + 6 * 16;

/// A six-octet Ethernet hardware address.
///
/// Accepted textual forms: `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff`, or the
/// twelve hex digits with no separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddr {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|c| !matches!(c, ':' | '-')).collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BridgeError::InvalidMacAddress(s.to_string()));
        }
        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| BridgeError::InvalidMacAddress(s.to_string()))?;
        }
        Ok(MacAddr(octets))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = BridgeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Builds the Wake-on-LAN magic packet for `mac`.
pub fn magic_packet(mac: &MacAddr) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0u8; MAGIC_PACKET_LEN];
    packet[..6].fill(0xff);
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac.octets());
    }
    packet
}

/// Sends the magic packet for `mac` to `broadcast:port`. Fire-and-forget: the
/// woken machine never answers.
pub async fn send_magic_packet(
    mac: &MacAddr,
    broadcast: IpAddr,
    port: u16,
) -> Result<(), BridgeError> {
    let packet = magic_packet(mac);
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.set_broadcast(true)?;
    socket.send_to(&packet, (broadcast, port)).await?;
    debug!("Sent wake packet for {mac} to {broadcast}:{port}");
    Ok(())
}
