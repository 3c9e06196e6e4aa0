// src/core/protocol/line_frame.rs

//! Implements the broker's line protocol and the corresponding `Encoder` and
//! `Decoder` for network communication.
//!
//! The broker speaks a textual, CRLF-terminated protocol. Outbound frames are
//! the subscription handshake and the keepalive ping. Inbound lines are
//! URL-encoded query strings (`key=value&key2=value2`) that always carry a
//! `cmd` field.

use crate::core::BridgeError;
use bytes::BytesMut;
use indexmap::IndexMap;
use std::borrow::Cow;
use tokio_util::codec::{Decoder, Encoder};

/// The CRLF (Carriage Return, Line Feed) sequence terminating outbound lines.
const CRLF: &[u8] = b"\r\n";

// Protocol-level limit to prevent unbounded buffering against a peer that
// never sends a line terminator.
const MAX_LINE_LEN: usize = 8 * 1024;

/// An outbound frame sent from the bridge to the broker.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// The subscription handshake, sent once per connection.
    Handshake { uid: String, topic: String },
    /// The keepalive heartbeat.
    Ping,
}

impl ClientFrame {
    /// A convenience method to encode a frame into a `Vec<u8>`.
    /// Useful where a complete byte vector is needed for a single write.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>, BridgeError> {
        let mut buf = BytesMut::new();
        LineCodec.encode(self.clone(), &mut buf)?;
        Ok(buf.to_vec())
    }
}

/// One decoded inbound protocol line: an ordered mapping from field name to
/// the list of values seen for it, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    fields: IndexMap<String, Vec<String>>,
}

impl CommandRecord {
    /// Parses one line (without its terminator) as a URL-encoded query string.
    ///
    /// Values are percent-decoded, `+` decodes to a space, and repeated keys
    /// are collected in order. Pairs without an `=` or with a blank value are
    /// dropped. A line with no surviving `cmd` field is a protocol violation.
    pub fn parse(line: &str) -> Result<Self, BridgeError> {
        let mut fields: IndexMap<String, Vec<String>> = IndexMap::new();
        for pair in line.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            let key = decode_component(key)?;
            let value = decode_component(value)?;
            fields.entry(key).or_default().push(value);
        }

        if !fields.contains_key("cmd") {
            return Err(BridgeError::Protocol(format!(
                "line is missing a cmd field: {line:?}"
            )));
        }
        Ok(Self { fields })
    }

    /// The value of the `cmd` field. Every record is guaranteed to carry one.
    pub fn cmd(&self) -> &str {
        self.first("cmd").unwrap_or_default()
    }

    /// The first value of `key`, if present.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values seen for `key`, in wire order.
    pub fn values(&self, key: &str) -> Option<&[String]> {
        self.fields.get(key).map(Vec::as_slice)
    }

    /// Whether this record is the broker's ping acknowledgment (`cmd=0`).
    /// Ping acks carry no payload and are consumed inside the session.
    pub fn is_ping_ack(&self) -> bool {
        self.cmd() == "0"
    }
}

/// Percent-decodes one query-string component, treating `+` as a space.
fn decode_component(raw: &str) -> Result<String, BridgeError> {
    let unplussed = raw.replace('+', " ");
    urlencoding::decode(&unplussed)
        .map(Cow::into_owned)
        .map_err(|e| BridgeError::Protocol(format!("invalid percent-encoding in {raw:?}: {e}")))
}

/// A `tokio_util::codec` implementation for the broker's line protocol.
#[derive(Debug, Default)]
pub struct LineCodec;

impl Encoder<ClientFrame> for LineCodec {
    type Error = BridgeError;

    fn encode(&mut self, item: ClientFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            ClientFrame::Handshake { uid, topic } => {
                dst.extend_from_slice(format!("cmd=1&uid={uid}&topic={topic}").as_bytes());
                dst.extend_from_slice(CRLF);
            }
            ClientFrame::Ping => {
                dst.extend_from_slice(b"ping");
                dst.extend_from_slice(CRLF);
            }
        }
        Ok(())
    }
}

impl Decoder for LineCodec {
    type Item = CommandRecord;
    type Error = BridgeError;

    /// Decodes one `\n`-terminated line from the buffer, tolerating both
    /// `\r\n` and a bare `\n`. Returns `Ok(None)` until a full line arrives.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(pos) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > MAX_LINE_LEN {
                return Err(BridgeError::Protocol(format!(
                    "line exceeds {MAX_LINE_LEN} bytes without a terminator"
                )));
            }
            return Ok(None);
        };

        let line = src.split_to(pos + 1);
        let mut line = &line[..pos];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }

        let line = std::str::from_utf8(line)
            .map_err(|e| BridgeError::Protocol(format!("line is not valid UTF-8: {e}")))?;
        CommandRecord::parse(line).map(Some)
    }
}
