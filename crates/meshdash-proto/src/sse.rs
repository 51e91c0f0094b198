// SPDX-License-Identifier: Apache-2.0
//! Incremental `text/event-stream` framing for the node update stream.
//!
//! The coordinator pushes named events on `GET /v1/stream/nodes`:
//!
//! ```text
//! event: node_update
//! data: {"node_id":"node-1","status":"ONLINE",...}
//! <blank line>
//! ```
//!
//! [`SseDecoder`] consumes arbitrary byte chunks and yields complete
//! events; framing never depends on chunk boundaries. Payload decoding is
//! separate ([`decode_node_update`]) so transport code can treat framing
//! errors and payload errors differently.

use serde_json::Error as JsonError;
use thiserror::Error;

use crate::NodeUpdateEvent;

/// Event name the coordinator uses for node change notifications.
pub const NODE_UPDATE_EVENT: &str = "node_update";

/// Failure to decode an event payload.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The `data` field was not a valid payload for the event name.
    #[error("malformed event payload: {0}")]
    Payload(#[from] JsonError),
    /// The event name is not the one the caller asked to decode.
    #[error("unexpected event name: {0:?}")]
    UnexpectedEvent(Option<String>),
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if the event was named.
    pub name: Option<String>,
    /// Concatenated `data:` lines, joined with `\n`.
    pub data: String,
    /// Value of the `id:` field, if present.
    pub id: Option<String>,
}

/// Incremental decoder for a `text/event-stream` byte stream.
///
/// Feed chunks as they arrive; events are dispatched on their terminating
/// blank line. Partial lines and partial UTF-8 sequences are buffered
/// across calls.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    name: Option<String>,
    data_lines: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk and return every event completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        while let Some(nl) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=nl).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            if let Some(event) = self.take_line(&line) {
                out.push(event);
            }
        }
        out
    }

    fn take_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment lines keep the connection alive; they carry no fields.
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.name = Some(value.to_string()),
            "data" => self.data_lines.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // `retry` and unknown fields are ignored.
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let name = self.name.take();
        let id = self.id.take();
        let data_lines = std::mem::take(&mut self.data_lines);
        if data_lines.is_empty() {
            // Nothing buffered (e.g. a keep-alive comment block); not an event.
            return None;
        }
        Some(SseEvent {
            name,
            data: data_lines.join("\n"),
            id,
        })
    }
}

/// Decode a [`NODE_UPDATE_EVENT`] payload.
pub fn decode_node_update(event: &SseEvent) -> Result<NodeUpdateEvent, DecodeError> {
    if event.name.as_deref() != Some(NODE_UPDATE_EVENT) {
        return Err(DecodeError::UnexpectedEvent(event.name.clone()));
    }
    Ok(serde_json::from_str(&event.data)?)
}
